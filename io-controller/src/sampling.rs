use streamline::Sampler;

use crate::board::AdcHandle;

#[embassy_executor::task]
pub async fn sampler_task(sampler: Sampler<'static, AdcHandle>) {
    sampler.run().await
}

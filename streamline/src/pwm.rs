use crate::error::ErrorCode;

/// A hardware PWM channel and the GPIO it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmSlot {
    pub gpio: u8,
    pub channel: u8,
    pub configured: bool,
}

/// Result of [`PwmAllocator::reserve`]: where `gpio` will live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrant {
    pub gpio: u8,
    pub channel: u8,
    /// `true` when the slot is not yet bound and needs [`PwmAllocator::bind`].
    pub fresh: bool,
}

/// Fixed pool of `N` PWM channels, handed out first-fit.
///
/// A binding is permanent: there is no release.
pub struct PwmAllocator<const N: usize> {
    slots: [PwmSlot; N],
}

impl<const N: usize> PwmAllocator<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|i| PwmSlot {
                gpio: 0,
                channel: i as u8,
                configured: false,
            }),
        }
    }

    /// The slot already bound to `gpio`, or the first free one.
    ///
    /// Nothing changes until [`bind`](Self::bind) is called with the grant,
    /// so a timer or channel setup failure does not use up a slot.
    pub fn reserve(&self, gpio: u8) -> Result<SlotGrant, ErrorCode> {
        if let Some(slot) = self.slot_for(gpio) {
            return Ok(SlotGrant {
                gpio,
                channel: slot.channel,
                fresh: false,
            });
        }
        self.slots
            .iter()
            .find(|slot| !slot.configured)
            .map(|slot| SlotGrant {
                gpio,
                channel: slot.channel,
                fresh: true,
            })
            .ok_or(ErrorCode::NoPwmSlotsAvailable)
    }

    pub fn bind(&mut self, grant: SlotGrant) {
        if !grant.fresh {
            return;
        }
        let slot = &mut self.slots[usize::from(grant.channel)];
        debug_assert!(!slot.configured);
        slot.gpio = grant.gpio;
        slot.configured = true;
        log::info!("PWM channel {} bound to GPIO {}", slot.channel, slot.gpio);
    }

    /// Reserve and bind in one step.
    pub fn allocate(&mut self, gpio: u8) -> Result<PwmSlot, ErrorCode> {
        let grant = self.reserve(gpio)?;
        self.bind(grant);
        Ok(self.slots[usize::from(grant.channel)])
    }

    pub fn slot_for(&self, gpio: u8) -> Option<&PwmSlot> {
        self.slots
            .iter()
            .find(|slot| slot.configured && slot.gpio == gpio)
    }

    pub fn slots(&self) -> &[PwmSlot; N] {
        &self.slots
    }
}

impl<const N: usize> Default for PwmAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

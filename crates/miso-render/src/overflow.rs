/// Rate limiter for capacity warnings.
///
/// A saturated stream or queue would otherwise log on every rejected draw of
/// every frame. The gate opens once, then stays closed until a whole frame
/// completes without a single rejection.
#[derive(Debug, Default)]
pub(crate) struct OverflowGate {
    warned: bool,
    tripped_this_frame: bool,
    dropped: u32,
}

impl OverflowGate {
    /// Records a rejection. Returns `true` when the caller should log it.
    pub(crate) fn trip(&mut self) -> bool {
        self.tripped_this_frame = true;
        self.dropped = self.dropped.saturating_add(1);
        !std::mem::replace(&mut self.warned, true)
    }

    /// Starts a new frame, re-arming the warning if the previous frame was clean.
    pub(crate) fn begin_frame(&mut self) {
        if !self.tripped_this_frame {
            self.warned = false;
        }
        self.tripped_this_frame = false;
        self.dropped = 0;
    }

    /// Rejections recorded since the last [`begin_frame`](Self::begin_frame).
    pub(crate) fn dropped(&self) -> u32 {
        self.dropped
    }
}

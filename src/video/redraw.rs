/// Dirty flag deciding whether the engine frame is composited this iteration.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    dirty: bool,
    viewport_size: Option<[f32; 2]>,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Consumes the flag. At most one render per iteration.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Treats a first or resized viewport as an expose and marks dirty.
    pub fn note_viewport(&mut self, size: [f32; 2]) {
        if self.viewport_size != Some(size) {
            log::trace!("Viewport exposed at {}x{}", size[0], size[1]);
            self.viewport_size = Some(size);
            self.dirty = true;
        }
    }
}

/// A setting that remembers whether it changed since it was last applied
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tunable<T> {
    value: T,
    modified: bool,
}

impl<T: Copy + PartialEq> Tunable<T> {
    /// A fresh tunable counts as modified so the first frame applies it
    pub fn new(value: T) -> Self {
        Self {
            value,
            modified: true,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Store a new value; only marks the tunable modified if the value differs
    pub fn set(&mut self, value: T) {
        if value != self.value {
            self.value = value;
            self.modified = true;
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns the value if it changed since the last call, clearing the flag
    pub fn take_modified(&mut self) -> Option<T> {
        if self.modified {
            self.modified = false;
            Some(self.value)
        } else {
            None
        }
    }
}

/// Host-facing tunables, read once per frame start
#[derive(Debug, Clone)]
pub struct VrConfig {
    /// Use the runtime's maximum FOV instead of its default
    pub max_fov: Tunable<bool>,
    /// Eye buffer resolution relative to the runtime's recommendation
    pub render_scale: Tunable<f32>,
    /// Ask the compositor to fade the edges of the distorted image
    pub distortion_fade: Tunable<bool>,
    /// Desaturate the image when the head leaves the tracking camera's view
    pub tracking_loss_fade: Tunable<bool>,
    /// Gamma applied by the swapchain copy
    pub gamma: f32,
}

impl Default for VrConfig {
    fn default() -> Self {
        Self {
            max_fov: Tunable::new(false),
            render_scale: Tunable::new(1.0),
            distortion_fade: Tunable::new(true),
            tracking_loss_fade: Tunable::new(true),
            gamma: 1.0,
        }
    }
}

/// Changes picked up at a frame start. `None` means unchanged.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ConfigChanges {
    pub max_fov: Option<bool>,
    pub render_scale: Option<f32>,
    pub distortion_fade: Option<bool>,
    pub tracking_loss_fade: Option<bool>,
}

impl ConfigChanges {
    /// Whether the eye buffers have to be renegotiated
    pub fn affects_targets(&self) -> bool {
        self.max_fov.is_some() || self.render_scale.is_some()
    }
}

impl VrConfig {
    /// Collect and clear every modified tunable
    pub fn take_changes(&mut self) -> ConfigChanges {
        ConfigChanges {
            max_fov: self.max_fov.take_modified(),
            render_scale: self.render_scale.take_modified(),
            distortion_fade: self.distortion_fade.take_modified(),
            tracking_loss_fade: self.tracking_loss_fade.take_modified(),
        }
    }
}

//! Request-independent settings: output encoding, warp method and worker threading.

use crate::foundation::error::{MockupError, MockupResult};

/// Strips are this many steps thick, so consecutive strips overlap.
pub const STRIP_THICKNESS_STEPS: u32 = 5;

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MockupConfig {
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub warp: WarpConfig,
    /// Worker threads for [`MockupPool`](crate::MockupPool); `None` uses rayon's default.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl MockupConfig {
    pub fn from_json_slice(bytes: &[u8]) -> MockupResult<Self> {
        let cfg: Self = serde_json::from_slice(bytes)
            .map_err(|e| MockupError::config(format!("parse config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> MockupResult<()> {
        if let OutputFormat::Jpeg { quality } = self.output
            && !(1..=100).contains(&quality)
        {
            return Err(MockupError::config(format!(
                "jpeg quality must be in 1..=100, got {quality}"
            )));
        }
        if self.warp.strip_step == 0 {
            return Err(MockupError::config("warp strip_step must be >= 1"));
        }
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(MockupError::config("threads must be >= 1 when set"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg {
        #[serde(default = "default_jpeg_quality")]
        quality: u8,
    },
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }
}

fn default_jpeg_quality() -> u8 {
    90
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarpMethod {
    /// Strip decomposition: march thin source strips along the quad's edges.
    #[default]
    Strips,
    /// Inverse-mapped projective transform with bilinear sampling.
    Homography,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WarpConfig {
    #[serde(default)]
    pub method: WarpMethod,
    /// Source pixels advanced per strip.
    #[serde(default = "default_strip_step")]
    pub strip_step: u32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            method: WarpMethod::default(),
            strip_step: default_strip_step(),
        }
    }
}

impl WarpConfig {
    pub fn strip_thickness(&self) -> u32 {
        self.strip_step.saturating_mul(STRIP_THICKNESS_STEPS)
    }
}

fn default_strip_step() -> u32 {
    1
}

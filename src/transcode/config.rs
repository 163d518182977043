//! Transcoder configuration

/// Settings for the external transcoder process
///
/// Geometry and frame rate come from the video configuration; this struct
/// only holds what is specific to the encoder.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Program to execute (must accept ffmpeg-style arguments)
    pub program: String,

    /// Pixel format of the raw input frames
    pub pixel_format: String,

    /// Output container/codec name
    pub codec: String,

    /// Output video bitrate
    pub bitrate: String,

    /// Arguments used verbatim instead of the generated encoder arguments
    pub custom_args: Option<Vec<String>>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            pixel_format: "yuv420p".to_string(),
            codec: "mpeg1video".to_string(),
            bitrate: "800k".to_string(),
            custom_args: None,
        }
    }
}

impl TranscoderConfig {
    /// Set the program to execute
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the output bitrate
    pub fn bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Replace the generated arguments, e.g. to run a passthrough filter
    pub fn custom_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.custom_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Build the argument list for the given input geometry and rate
    ///
    /// Raw frames are read from stdin, the encoded stream is written to
    /// stdout at the same frame rate.
    pub fn args(&self, width: u32, height: u32, framerate: u32) -> Vec<String> {
        if let Some(args) = &self.custom_args {
            return args.clone();
        }

        let rate = format!("{:.1}", framerate as f64);
        vec![
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            rate.clone(),
            "-i".to_string(),
            "-".to_string(),
            "-f".to_string(),
            self.codec.clone(),
            "-b:v".to_string(),
            self.bitrate.clone(),
            "-r".to_string(),
            rate,
            "-".to_string(),
        ]
    }
}

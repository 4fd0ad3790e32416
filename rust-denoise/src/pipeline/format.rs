//! Output format table and input form detection.

use std::convert::Infallible;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Codec used for the PCM interchange format and for unrecognized outputs.
pub(crate) const PCM_CODEC: &str = "pcm_s16le";

/// Requested output format.
///
/// Parsing never fails: tokens outside the table become [`OutputFormat::Other`],
/// which is encoded as 16-bit PCM in a WAV container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Denoised PCM, returned as-is.
    #[default]
    Raw,
    Wav,
    Mp3,
    Flac,
    Ogg,
    Aac,
    M4a,
    /// Unrecognized token, kept verbatim.
    Other(String),
}

impl OutputFormat {
    /// Parse a format token case-insensitively. An empty token means raw.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "" | "raw" => Self::Raw,
            "wav" => Self::Wav,
            "mp3" => Self::Mp3,
            "flac" => Self::Flac,
            "ogg" => Self::Ogg,
            "aac" => Self::Aac,
            "m4a" => Self::M4a,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Raw => "raw",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Other(token) => token,
        }
    }

    /// Encoder passed to ffmpeg's `-acodec`, or `None` when no encode is needed.
    pub fn codec(&self) -> Option<&'static str> {
        match self {
            Self::Raw => None,
            Self::Wav => Some(PCM_CODEC),
            Self::Mp3 => Some("libmp3lame"),
            Self::Flac => Some("flac"),
            Self::Ogg => Some("libvorbis"),
            Self::Aac | Self::M4a => Some("aac"),
            Self::Other(_) => Some(PCM_CODEC),
        }
    }

    /// File extension of the encoded artifact; ffmpeg picks the muxer from it.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "pcm",
            Self::Wav | Self::Other(_) => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
            Self::M4a => "m4a",
        }
    }

    /// `Content-Type` for returning the encoded bytes directly.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
            _ => "application/octet-stream",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the artifact at `path` is declared as raw PCM by its suffix.
pub fn is_raw_pcm(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pcm") || ext.eq_ignore_ascii_case("raw"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("raw", None, "application/octet-stream")]
    #[case("", None, "application/octet-stream")]
    #[case("wav", Some("pcm_s16le"), "audio/wav")]
    #[case("MP3", Some("libmp3lame"), "audio/mpeg")]
    #[case("Flac", Some("flac"), "audio/flac")]
    #[case("ogg", Some("libvorbis"), "application/octet-stream")]
    #[case("aac", Some("aac"), "application/octet-stream")]
    #[case("m4a", Some("aac"), "application/octet-stream")]
    #[case("xyz", Some("pcm_s16le"), "application/octet-stream")]
    fn format_table(
        #[case] token: &str,
        #[case] codec: Option<&str>,
        #[case] content_type: &str,
    ) {
        let format = OutputFormat::parse(token);
        assert_eq!(format.codec(), codec);
        assert_eq!(format.content_type(), content_type);
    }

    #[test]
    fn unknown_token_falls_back_to_wav_container() {
        let format: OutputFormat = "xyz".parse().unwrap();
        assert_eq!(format, OutputFormat::Other("xyz".to_string()));
        assert_eq!(format.extension(), "wav");
        assert_eq!(format.to_string(), "xyz");
    }

    #[rstest]
    #[case("input.pcm", true)]
    #[case("input.RAW", true)]
    #[case("input.wav", false)]
    #[case("input", false)]
    #[case("pcm", false)]
    fn pcm_detection(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_raw_pcm(Path::new(name)), expected);
    }
}

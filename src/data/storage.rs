use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::capture::FinalizedCapture;
use super::model::Channel;

/// Decimal places written for elapsed time and intensity.
pub const DEFAULT_DECIMALS: usize = 6;

// ---------------------------------------------------------------------------
// Capture file triple
// ---------------------------------------------------------------------------

/// Per-capture facts written into every file header.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    /// Instrument model string.
    pub instrument_model: String,
    /// Resolved wavelength per channel, indexed by [`Channel::index`].
    pub wavelengths: [f64; 3],
}

/// Path of one channel file derived from the user-chosen base path.
///
/// `run.txt` becomes `runline.txt`, `runbkg.txt` and `runbase.txt`.
pub fn channel_path(base: &Path, channel: Channel) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}{}", channel.file_suffix());
    if let Some(ext) = base.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    base.with_file_name(name)
}

/// Inverse of [`channel_path`]: `runline.txt` (or any sibling) gives back
/// `run.txt`. Paths without a channel suffix are returned unchanged.
pub fn capture_base(path: &Path) -> PathBuf {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return path.to_path_buf();
    };
    let Some(base_stem) = Channel::ALL
        .iter()
        .find_map(|c| stem.strip_suffix(c.file_suffix()))
    else {
        return path.to_path_buf();
    };
    let mut name = base_stem.to_string();
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Write the three channel files for a capture. Returns the written paths.
pub fn save_capture(
    base: &Path,
    capture: &FinalizedCapture,
    metadata: &CaptureMetadata,
    decimals: usize,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(Channel::ALL.len());
    for channel in Channel::ALL {
        let path = channel_path(base, channel);
        let file = File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_channel(
            &mut out,
            channel,
            &capture.elapsed,
            capture.channel(channel),
            metadata,
            decimals,
        )
        .with_context(|| format!("writing {}", path.display()))?;
        out.flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        written.push(path);
    }
    log::info!(
        "Saved {} samples to {}",
        capture.len(),
        channel_path(base, Channel::Line).display()
    );
    Ok(written)
}

/// Write one channel: commented header, then `elapsed,intensity` rows.
pub fn write_channel<W: Write>(
    out: &mut W,
    channel: Channel,
    elapsed: &[f64],
    values: &[f64],
    metadata: &CaptureMetadata,
    decimals: usize,
) -> Result<()> {
    if elapsed.len() != values.len() {
        bail!(
            "{channel}: {} timestamps but {} values",
            elapsed.len(),
            values.len()
        );
    }
    writeln!(out, "# Spectrometer = {}", metadata.instrument_model)?;
    writeln!(
        out,
        "# Wavelength (nm) = {:.3}",
        metadata.wavelengths[channel.index()]
    )?;
    writeln!(out, "# {}", channel.description())?;
    writeln!(out, "# Time (s), Count")?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    for (&t, &v) in elapsed.iter().zip(values) {
        writer.write_record([format!("{t:.decimals$}"), format!("{v:.decimals$}")])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// One channel file read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrace {
    pub instrument_model: Option<String>,
    pub wavelength: Option<f64>,
    pub elapsed: Vec<f64>,
    pub values: Vec<f64>,
}

/// All three channel files of a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCapture {
    pub line: ChannelTrace,
    pub background: ChannelTrace,
    pub baseline: ChannelTrace,
}

/// Read the triple written by [`save_capture`] for `base`.
pub fn load_capture(base: &Path) -> Result<LoadedCapture> {
    let load = |channel| {
        let path = channel_path(base, channel);
        load_channel(&path).with_context(|| format!("loading {}", path.display()))
    };
    Ok(LoadedCapture {
        line: load(Channel::Line)?,
        background: load(Channel::Background)?,
        baseline: load(Channel::Baseline)?,
    })
}

/// Parse one channel file. `#` lines are header; every other line is a row.
pub fn load_channel(path: &Path) -> Result<ChannelTrace> {
    let text = std::fs::read_to_string(path).context("reading capture file")?;
    parse_channel(&text)
}

fn parse_channel(text: &str) -> Result<ChannelTrace> {
    let mut instrument_model = None;
    let mut wavelength = None;
    for line in text.lines().filter_map(|l| l.strip_prefix('#')) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "Spectrometer" => instrument_model = Some(value.trim().to_string()),
                "Wavelength (nm)" => wavelength = value.trim().parse().ok(),
                _ => {}
            }
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut elapsed = Vec::new();
    let mut values = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        if record.len() != 2 {
            bail!("row {row_no}: expected 2 columns, found {}", record.len());
        }
        elapsed.push(parse_cell(&record[0], row_no)?);
        values.push(parse_cell(&record[1], row_no)?);
    }

    Ok(ChannelTrace {
        instrument_model,
        wavelength,
        elapsed,
        values,
    })
}

fn parse_cell(cell: &str, row: usize) -> Result<f64> {
    cell.parse::<f64>()
        .with_context(|| format!("row {row}: '{cell}' is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CaptureMetadata {
        CaptureMetadata {
            instrument_model: "SIM-2048".into(),
            wavelengths: [656.285, 650.0, 640.5],
        }
    }

    #[test]
    fn channel_paths_follow_stem() {
        let base = Path::new("/data/run7.txt");
        assert_eq!(
            channel_path(base, Channel::Background),
            PathBuf::from("/data/run7bkg.txt")
        );
        assert_eq!(
            channel_path(Path::new("plain"), Channel::Line),
            PathBuf::from("plainline")
        );
    }

    #[test]
    fn header_and_rows_are_written() {
        let mut buf = Vec::new();
        write_channel(
            &mut buf,
            Channel::Line,
            &[0.0251, 0.05],
            &[1200.5, 1201.25],
            &metadata(),
            3,
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Spectrometer = SIM-2048");
        assert_eq!(lines[1], "# Wavelength (nm) = 656.285");
        assert_eq!(lines[2], "# Analytical Line data");
        assert_eq!(lines[3], "# Time (s), Count");
        assert_eq!(lines[4], "0.025,1200.500");
        assert_eq!(lines.len(), 6);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn parse_recovers_header_fields() {
        let trace = parse_channel(
            "# Spectrometer = SIM-2048\n# Wavelength (nm) = 650.000\n# Background data\n\
             # Time (s), Count\n0.1,5\n0.2,6\n",
        )
        .unwrap();
        assert_eq!(trace.instrument_model.as_deref(), Some("SIM-2048"));
        assert_eq!(trace.wavelength, Some(650.0));
        assert_eq!(trace.elapsed, vec![0.1, 0.2]);
        assert_eq!(trace.values, vec![5.0, 6.0]);
    }

    #[test]
    fn garbage_row_is_an_error() {
        assert!(parse_channel("0.1,abc\n").is_err());
    }

    #[test]
    fn mismatched_columns_are_refused() {
        let mut buf = Vec::new();
        let err = write_channel(&mut buf, Channel::Line, &[0.1], &[], &metadata(), 3);
        assert!(err.is_err());
    }

    #[test]
    fn channel_file_maps_back_to_base() {
        let base = Path::new("/data/run.txt");
        for channel in Channel::ALL {
            assert_eq!(capture_base(&channel_path(base, channel)), base);
        }
        assert_eq!(capture_base(Path::new("/data/other.txt")), Path::new("/data/other.txt"));
    }
}

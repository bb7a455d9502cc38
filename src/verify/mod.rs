//! Read-back verification of frame records written to a raw block device.
//!
//! The verifier rebuilds the [`RecordLayout`] from the frame size and sector size, so it agrees
//! with the converter on every record offset. Reads go through bounded chunks on both sides.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
};

use anyhow::Context as _;

use crate::config::{RecordPacking, VerifyConfig};
use crate::foundation::error::{FramepackError, FramepackResult};
use crate::layout::RecordLayout;

/// One differing byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mismatch {
    /// Offset into the reference file.
    pub reference_offset: u64,
    /// Absolute offset on the device.
    pub device_offset: u64,
    pub device: u8,
    pub reference: u8,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MISMATCH at byte {}: device=0x{:02x}, file=0x{:02x} (device offset {})",
            self.reference_offset, self.device, self.reference, self.device_offset
        )
    }
}

/// The device ended before the verification window did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Truncation {
    /// Absolute end of the window.
    pub required_end: u64,
    /// Bytes the device actually holds.
    pub device_len: u64,
}

/// Outcome of one verification run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport {
    pub layout: RecordLayout,
    pub packing: RecordPacking,
    /// Absolute byte offset of the first record on the device.
    pub region_start: u64,
    pub reference_len: u64,
    pub frames: u64,
    /// Reference bytes compared against the device.
    pub verified_bytes: u64,
    /// Trailing reference bytes that do not form a whole frame and so were never compared.
    pub unverified_tail: u64,
    pub mismatches: Vec<Mismatch>,
    /// Comparison stopped at the mismatch cap.
    pub stopped_early: bool,
    pub truncated: Option<Truncation>,
}

impl VerifyReport {
    /// Verdict: every byte of the window matched.
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty() && self.truncated.is_none() && self.unverified_tail == 0
    }

    /// Bytes on the device covered by the window.
    pub fn region_len(&self) -> u64 {
        match self.packing {
            RecordPacking::Padded => self.layout.span(self.frames),
            RecordPacking::Contiguous => self.reference_len,
        }
    }
}

/// Frame count held by a reference file of `reference_len` bytes, plus the trailing bytes that do
/// not form a whole frame.
pub fn frame_count(reference_len: u64, layout: &RecordLayout, packing: RecordPacking) -> (u64, u64) {
    let unit = match packing {
        RecordPacking::Padded => layout.raw_size,
        RecordPacking::Contiguous => layout.padded_size,
    };
    (reference_len / unit, reference_len % unit)
}

/// Open the device and reference named in `cfg` and compare them.
#[tracing::instrument(skip(cfg), fields(device = %cfg.device.display(), reference = %cfg.reference.display()))]
pub fn verify_device(cfg: &VerifyConfig) -> FramepackResult<VerifyReport> {
    cfg.validate()?;
    let mut reference = File::open(&cfg.reference)
        .with_context(|| format!("open reference '{}'", cfg.reference.display()))?;
    let reference_len = reference
        .metadata()
        .with_context(|| format!("stat reference '{}'", cfg.reference.display()))?
        .len();
    let mut device = File::open(&cfg.device)
        .with_context(|| format!("open device '{}'", cfg.device.display()))?;
    verify_region(&mut device, &mut reference, reference_len, cfg)
}

/// Compare `reference` (exactly `reference_len` bytes) against the window of `device` described by
/// `cfg`. The device and reference paths in `cfg` are not used.
pub fn verify_region<D, R>(
    device: &mut D,
    reference: &mut R,
    reference_len: u64,
    cfg: &VerifyConfig,
) -> FramepackResult<VerifyReport>
where
    D: Read + Seek,
    R: Read,
{
    cfg.validate()?;
    let layout = RecordLayout::new(cfg.raw_frame_size, cfg.sector_size)?;
    let region_start = cfg.start_offset();
    let (frames, remainder) = frame_count(reference_len, &layout, cfg.packing);
    if remainder != 0 {
        tracing::warn!(
            reference_len,
            remainder,
            packing = ?cfg.packing,
            "reference size is not a whole number of records"
        );
    }

    let mut report = VerifyReport {
        layout,
        packing: cfg.packing,
        region_start,
        reference_len,
        frames,
        verified_bytes: 0,
        unverified_tail: match cfg.packing {
            RecordPacking::Padded => remainder,
            // compared like every other reference byte
            RecordPacking::Contiguous => 0,
        },
        mismatches: Vec::new(),
        stopped_early: false,
        truncated: None,
    };

    // Spans as (device offset, length), in reference order.
    let spans: Vec<(u64, u64)> = match cfg.packing {
        RecordPacking::Padded => (0..frames)
            .map(|i| (region_start + layout.record_offset(i), layout.raw_size))
            .collect(),
        RecordPacking::Contiguous => vec![(region_start, reference_len)],
    };
    let required_end = spans
        .iter()
        .map(|&(start, len)| start + len)
        .max()
        .unwrap_or(region_start);

    // Character devices (raw disks on macOS) report a length of 0 here. Anything below the window
    // start is treated as unknown and left to end-of-file detection while reading.
    let device_len = device
        .seek(SeekFrom::End(0))
        .context("measure device size")?;
    if device_len <= region_start {
        tracing::debug!(device_len, "device size unknown; relying on read-side end of file");
    } else if device_len < required_end {
        tracing::warn!(device_len, required_end, "device is shorter than the verification window");
        report.truncated = Some(Truncation {
            required_end,
            device_len,
        });
        return Ok(report);
    }

    tracing::info!(
        frames,
        raw_size = layout.raw_size,
        padded_size = layout.padded_size,
        region_start,
        "verifying device region"
    );

    let mut dbuf = vec![0u8; cfg.chunk_size];
    let mut rbuf = vec![0u8; cfg.chunk_size];
    for (device_offset, len) in spans {
        device
            .seek(SeekFrom::Start(device_offset))
            .with_context(|| format!("seek device to {device_offset}"))?;
        let keep_going = compare_span(
            device,
            reference,
            device_offset,
            len,
            cfg,
            &mut report,
            &mut dbuf,
            &mut rbuf,
        )?;
        if !keep_going {
            break;
        }
    }

    if report.is_ok() {
        tracing::info!(bytes = report.verified_bytes, frames, "device region verified");
    } else {
        tracing::warn!(
            mismatches = report.mismatches.len(),
            stopped_early = report.stopped_early,
            "device region differs from reference"
        );
    }
    Ok(report)
}

/// Returns `false` once the mismatch cap is reached.
#[allow(clippy::too_many_arguments)]
fn compare_span<D: Read, R: Read>(
    device: &mut D,
    reference: &mut R,
    device_offset: u64,
    len: u64,
    cfg: &VerifyConfig,
    report: &mut VerifyReport,
    dbuf: &mut [u8],
    rbuf: &mut [u8],
) -> FramepackResult<bool> {
    let mut done = 0u64;
    while done < len {
        let n = (len - done).min(dbuf.len() as u64) as usize;
        let reference_offset = report.verified_bytes;

        if let Err(e) = device.read_exact(&mut dbuf[..n]) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                report.truncated = Some(Truncation {
                    required_end: device_offset + len,
                    device_len: device_offset + done,
                });
                return Ok(false);
            }
            return Err(anyhow::Error::new(e)
                .context(format!("read device at {}", device_offset + done))
                .into());
        }
        reference.read_exact(&mut rbuf[..n]).map_err(|e| {
            FramepackError::Other(
                anyhow::Error::new(e).context(format!("read reference at {reference_offset}")),
            )
        })?;

        if dbuf[..n] != rbuf[..n] {
            for (i, (&d, &r)) in dbuf[..n].iter().zip(&rbuf[..n]).enumerate() {
                if d == r {
                    continue;
                }
                report.mismatches.push(Mismatch {
                    reference_offset: reference_offset + i as u64,
                    device_offset: device_offset + done + i as u64,
                    device: d,
                    reference: r,
                });
                if report.mismatches.len() >= cfg.max_mismatches {
                    report.verified_bytes += i as u64 + 1;
                    report.stopped_early = true;
                    return Ok(false);
                }
            }
        }

        done += n as u64;
        report.verified_bytes += n as u64;
        tracing::debug!(verified = report.verified_bytes, total = report.reference_len, "progress");
    }
    Ok(true)
}

#[cfg(test)]
#[path = "../../tests/unit/verify/mod.rs"]
mod tests;

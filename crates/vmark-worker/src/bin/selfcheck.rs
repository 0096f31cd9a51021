use std::path::Path;

use vmark_media::codec::test_robustness;
use vmark_media::fs_utils::ensure_dir;
use vmark_media::{build_codec, check_ffmpeg, check_ffprobe, CodecMode, Frame};
use vmark_models::limits::{DEFAULT_STRENGTH, MAX_STRENGTH};
use vmark_worker::{init_tracing, WorkerConfig};

const SAMPLE_TEXT: &str = "selfcheck";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env();
    println!(
        "vmark-selfcheck: starting with upload_dir={} processed_dir={} mode={}",
        config.upload_dir.display(),
        config.processed_dir.display(),
        config.codec_mode
    );

    ensure_workdir(&config.upload_dir).await?;
    ensure_workdir(&config.processed_dir).await?;
    if let Some(parent) = config.registry_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_workdir(parent).await?;
    }

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!("vmark-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    let codec = build_codec(config.codec_mode, &config.codec_config())?;
    let marked = codec.embed(&ramp_frame(), SAMPLE_TEXT, DEFAULT_STRENGTH)?;
    let recovered = codec.extract(&marked, SAMPLE_TEXT.len())?;
    if config.codec_mode == CodecMode::Basic && recovered.as_deref() != Some(SAMPLE_TEXT) {
        return Err(anyhow::anyhow!(
            "round trip failed: expected {:?}, got {:?}",
            SAMPLE_TEXT,
            recovered
        ));
    }
    println!("vmark-selfcheck: round trip -> {:?}", recovered);

    let report = test_robustness(&textured_frame(), MAX_STRENGTH, &config.codec_config())?;
    println!(
        "vmark-selfcheck: robustness of {:?} at strength {}",
        report.text, report.strength
    );
    for (perturbation, passed) in &report.results {
        println!(
            "  {:<18} {}",
            perturbation.as_str(),
            if *passed { "pass" } else { "fail" }
        );
    }

    println!("vmark-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    ensure_dir(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))
}

/// Smooth RGB frame, far from the clipping range.
fn ramp_frame() -> Frame {
    Frame::from_fn(320, 240, 3, |(y, x, c)| {
        (100 + (x % 8) * 4 + (y % 8) * 3 + c * 5) as u8
    })
}

/// Textured RGB frame with contrast in every block.
fn textured_frame() -> Frame {
    Frame::from_fn(320, 240, 3, |(y, x, c)| {
        (60 + (x * 3 + y * 2 + c * 20) % 120) as u8
    })
}

//! Tilework CLI - Region-driven Buffer Operations
//!
//! A demonstration binary: lists the built-in operations or runs them over
//! synthetic buffers. Set `RUST_LOG=debug` to follow the processing calls.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tilework::operations::warp::CacheState;
use tilework::prelude::*;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("tilework");

    match args.get(1).map(String::as_str) {
        None | Some("demo") => demo(),
        Some("list") => list_operations(),
        Some("help" | "--help" | "-h") => {
            print_usage(program);
            Ok(())
        }
        Some(other) => {
            print_usage(program);
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage(program: &str) {
    println!("Tilework v{}", tilework::VERSION);
    println!();
    println!("Usage: {} <command>", program);
    println!();
    println!("Commands:");
    println!("  demo    Warp a stroke and median-blur a test pattern (default)");
    println!("  list    Print the built-in operations as JSON");
    println!("  help    Show this help message");
}

fn list_operations() -> Result<()> {
    let metadata = tilework::operations::list();
    let json = serde_json::to_string_pretty(&metadata).context("serializing operation metadata")?;
    println!("{}", json);
    Ok(())
}

fn demo() -> Result<()> {
    let config = ComputeConfig::default();
    log::info!(
        "Running demo on {} worker thread(s)",
        Distributor::from_config(&config).max_threads()
    );

    warp_demo(&config)?;
    median_demo(&config)?;
    Ok(())
}

/// Grow a stroke in three steps and warp a zero field with it.
fn warp_demo(config: &ComputeConfig) -> Result<()> {
    let extent = Rectangle::new(0, 0, 256, 256);
    let field: SharedBuffer = Arc::new(Buffer::new(extent, PixelFormat::vector2()));

    let mut warp = WarpOperation::new();
    warp.set_parameter("size", Value::Float(48.0))?;
    warp.set_parameter("strength", Value::Float(80.0))?;

    let mut stroke = Stroke::new();
    for step in 0..3 {
        let x0 = 40.0 + step as f64 * 60.0;
        stroke = stroke.extended((0..=6).map(|i| PathPoint::new(x0 + i as f64 * 10.0, 128.0)));
        warp.set_parameter("stroke", Value::Path(stroke.clone()))?;
        warp.prepare(Some(PixelFormat::vector2()));

        let mut ctx =
            ProcessContext::new(config.clone()).with_input(INPUT_PORT, Arc::clone(&field));
        ctx.run(&mut warp, &extent)?;

        let output = ctx
            .take_output(OUTPUT_PORT)
            .context("warp produced no output")?;
        let magnitude = output
            .to_vec()
            .chunks_exact(2)
            .map(|v| (v[0] * v[0] + v[1] * v[1]).sqrt())
            .fold(0.0f32, f32::max);

        let report = warp.last_report().cloned().unwrap_or_default();
        println!(
            "warp step {}: {} point(s), {} stamp(s), region {}, max displacement {:.2}, cache {:?}",
            step + 1,
            report.points,
            report.stamps,
            report
                .region
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            magnitude,
            warp.cache_state()
        );
    }

    if warp.cache_state() != CacheState::Valid {
        bail!("warp cache should be valid after processing");
    }
    Ok(())
}

/// Median-blur a noisy checkerboard in both precision modes.
fn median_demo(config: &ComputeConfig) -> Result<()> {
    let extent = Rectangle::new(0, 0, 192, 128);
    let data: Vec<f32> = (0..extent.area())
        .flat_map(|i| {
            let (x, y) = (i % 192, i / 192);
            let base = if (x / 16 + y / 16) % 2 == 0 { 0.8 } else { 0.2 };
            // Sparse salt-and-pepper noise
            let noise = match i.wrapping_mul(2654435761) % 97 {
                0 => 1.0,
                1 => -1.0,
                _ => 0.0,
            };
            let v = (base + noise as f32).clamp(0.0, 1.0);
            [v, v, v, 1.0]
        })
        .collect();
    let image: SharedBuffer = Arc::new(Buffer::from_data(extent, PixelFormat::rgba(), &data)?);

    for high_precision in [false, true] {
        let mut median = MedianBlur::new();
        median.set_parameter("radius", Value::Integer(2))?;
        median.set_parameter("high-precision", Value::Boolean(high_precision))?;
        let format = median.prepare(Some(image.format()));

        let mut ctx =
            ProcessContext::new(config.clone()).with_input(INPUT_PORT, Arc::clone(&image));
        let started = std::time::Instant::now();
        ctx.run(&mut median, &extent)?;
        let elapsed = started.elapsed();

        let output = ctx
            .take_output(OUTPUT_PORT)
            .context("median blur produced no output")?;
        let outliers = output
            .to_vec()
            .chunks_exact(4)
            .filter(|p| (p[0] - 0.8).abs() > 1e-3 && (p[0] - 0.2).abs() > 1e-3)
            .count();

        println!(
            "median blur ({}): {} {} in {:.1} ms, {} pixel(s) off the pattern",
            if high_precision { "exact" } else { "quantized" },
            output.extent(),
            format,
            elapsed.as_secs_f64() * 1000.0,
            outliers
        );
    }
    Ok(())
}

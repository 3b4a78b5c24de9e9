//! Clip sampler binary — prints skinning matrices for a scene description.
//!
//! Usage: cargo run --bin sample_clip -- --scene <PATH> [OPTIONS]
//!
//! Options:
//!   --scene <PATH>    Scene description JSON (required)
//!   --config <PATH>   Animation config JSON (default: built-in defaults)
//!   --clip <NAME>     Clip to sample (default: first clip)
//!   --skin <N>        Skin index (default: 0)
//!   --time <T>        First sample time in seconds (default: 0.0)
//!   --frames <N>      Number of samples (default: 1)
//!   --fps <F>         Sample rate when --frames > 1 (default: 30.0)

use std::path::PathBuf;
use std::process::ExitCode;

use rkanim::animation::{BoneTransformSampler, LoopMode, SampleScratch, SkinnedScene};
use rkanim::core::{AnimationConfig, Result};

fn main() -> ExitCode {
    rkanim::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(scene_path) = parse_str_arg(&args, "--scene").map(PathBuf::from) else {
        eprintln!("usage: sample_clip --scene <PATH> [--config <PATH>] [--clip <NAME>] [--skin <N>] [--time <T>] [--frames <N>] [--fps <F>]");
        return ExitCode::FAILURE;
    };

    match run(&args, scene_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String], scene_path: PathBuf) -> Result<()> {
    let config = match parse_str_arg(args, "--config") {
        Some(path) => AnimationConfig::load_sync(&PathBuf::from(path))?,
        None => AnimationConfig::default(),
    };
    let skin = parse_usize_arg(args, "--skin").unwrap_or(0);
    let start = parse_f32_arg(args, "--time").unwrap_or(0.0);
    let frames = parse_usize_arg(args, "--frames").unwrap_or(1).max(1);
    let fps = parse_f32_arg(args, "--fps").unwrap_or(30.0);

    let scene = SkinnedScene::load_sync(&scene_path)?;
    let clip_index = match parse_str_arg(args, "--clip") {
        Some(name) => scene.clip_index(&name)?,
        None => 0,
    };

    let loop_mode = if config.looping { LoopMode::Wrap } else { LoopMode::Clamp };
    let sampler = BoneTransformSampler::new(&scene, skin, clip_index)?
        .with_joint_limit(config.joint_limit())?
        .with_loop_mode(loop_mode);

    println!("=== Clip Sampler ===");
    println!("Scene:    {}", scene_path.display());
    println!("Clip:     {} ({:.3}s)", sampler.clip().name, sampler.duration());
    println!("Joints:   {}", sampler.joint_count());
    println!();

    let mut scratch = SampleScratch::new();
    let mut matrices = Vec::with_capacity(sampler.joint_count());
    for frame in 0..frames {
        let time = start + frame as f32 * config.playback_speed / fps;
        sampler.sample_with_scratch(time, &mut scratch, &mut matrices);

        println!("t = {:.4} (clip time {:.4})", time, sampler.clip_time(time));
        for (joint, matrix) in sampler.skin().joints.iter().zip(&matrices) {
            let name = &scene.nodes()[*joint].name;
            println!("  joint {:>3} {:<16} {:?}", joint, name, matrix.to_cols_array());
        }
    }

    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chalkcast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and structurally validate a timeline JSON.
    Validate(ValidateArgs),
    /// Render one slide at a given elapsed time as a PNG.
    Frame(FrameArgs),
    /// Play a timeline headlessly (silent synthesizer), logging progress.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Slide index (0-based).
    #[arg(long, default_value_t = 0)]
    slide: usize,

    /// Elapsed seconds into the slide's drawing timeline.
    #[arg(long, default_value_t = 0.0)]
    elapsed: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Playback-rate multiplier.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Start muted.
    #[arg(long)]
    mute: bool,

    /// Answer quiz gates correctly instead of letting them time out.
    #[arg(long)]
    answer_correctly: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn read_timeline_json(path: &Path) -> anyhow::Result<chalkcast::Timeline> {
    let f = File::open(path).with_context(|| format!("open timeline '{}'", path.display()))?;
    let r = BufReader::new(f);
    let timeline: chalkcast::Timeline =
        serde_json::from_reader(r).with_context(|| "parse timeline JSON")?;
    Ok(timeline)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let timeline = read_timeline_json(&args.in_path)?;
    timeline.validate()?;
    eprintln!(
        "ok: '{}', {} slides, {:.1}s nominal",
        timeline.title,
        timeline.slides.len(),
        timeline.total_duration()
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let timeline = read_timeline_json(&args.in_path)?;
    timeline.validate()?;

    let slide = timeline
        .slides
        .get(args.slide)
        .with_context(|| format!("slide index {} out of range", args.slide))?;

    let mut board = chalkcast::Whiteboard::new(chalkcast::Canvas::SLIDE)?;
    let frame = board.render(&slide.drawings, args.elapsed)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

struct LogHooks;

impl chalkcast::PlaybackHooks for LogHooks {
    fn on_slide_change(&mut self, index: usize) {
        eprintln!("slide -> {index}");
    }
    fn on_quiz_gate(&mut self, index: usize) {
        eprintln!("quiz gate on slide {index}");
    }
    fn on_sequence_end(&mut self) {
        eprintln!("sequence end");
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let timeline = read_timeline_json(&args.in_path)?;
    timeline.validate()?;

    let driver = chalkcast::NarrationDriver::new(
        Box::new(chalkcast::SilentBackend::new()),
        chalkcast::VoicePreference::default(),
    );
    let mut controller = chalkcast::PlaybackController::new(timeline, driver, Box::new(LogHooks));

    controller.set_speed(args.speed);
    if args.mute {
        controller.toggle_mute();
    }
    controller.play();

    // 60 Hz headless ticker, bounded so a bad timeline cannot spin forever.
    let dt = 1.0 / 60.0;
    let max_ticks = 60 * 60 * 60;
    for _ in 0..max_ticks {
        controller.tick(dt);
        match controller.phase() {
            chalkcast::Phase::QuizGate => {
                if args.answer_correctly {
                    let correct_index = controller
                        .current_slide_data()
                        .and_then(|s| s.quiz.as_ref())
                        .map(|q| q.correct_index);
                    controller.answer_quiz(true, correct_index);
                } else {
                    controller.answer_quiz(false, None);
                }
            }
            chalkcast::Phase::Ended => break,
            _ => {}
        }
    }

    if controller.phase() != chalkcast::Phase::Ended {
        anyhow::bail!("playback did not reach the end within the tick budget");
    }

    for outcome in controller.outcomes() {
        eprintln!(
            "quiz '{}': correct={} selected={:?} timed_out={}",
            outcome.slide_id, outcome.correct, outcome.selected, outcome.timed_out
        );
    }
    eprintln!("progress {:.0}%", controller.timeline_progress() * 100.0);
    Ok(())
}

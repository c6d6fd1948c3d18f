use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use mdprep::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct PhaseState {
    bar: ProgressBar,
    name: &'static str,
    started: Option<Instant>,
    completed: usize,
}

/// Renders engine progress events as a spinner per phase and a bar per task.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<PhaseState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new(0).with_style(spinner_style());
        bar.set_draw_target(target);
        bar.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(PhaseState {
                bar,
                name: "",
                started: None,
                completed: 0,
            })),
        }
    }

    /// Number of phases that have finished so far.
    pub fn completed_phases(&self) -> usize {
        self.state.lock().map(|s| s.completed).unwrap_or(0)
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress state mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    state.name = name;
                    state.started = Some(Instant::now());
                    let bar = &state.bar;
                    bar.reset();
                    bar.set_length(0);
                    bar.set_style(spinner_style());
                    bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    bar.set_message(name);
                }
                Progress::PhaseFinish => {
                    let elapsed = state
                        .started
                        .take()
                        .map_or(0.0, |t| t.elapsed().as_secs_f64());
                    state.completed += 1;
                    let bar = &state.bar;
                    bar.disable_steady_tick();
                    bar.set_style(spinner_style());
                    bar.finish_with_message(format!("✓ {} ({elapsed:.1}s)", state.name));
                }
                Progress::TaskStart { total_steps } => {
                    let bar = &state.bar;
                    bar.disable_steady_tick();
                    bar.reset();
                    bar.set_length(total_steps);
                    bar.set_position(0);
                    bar.set_style(bar_style());
                    bar.set_message(state.name);
                }
                Progress::TaskIncrement => {
                    state.bar.inc(1);
                }
                Progress::TaskFinish => {
                    let bar = &state.bar;
                    let length = bar.length().unwrap_or(0);
                    if bar.position() < length {
                        bar.set_position(length);
                    }
                    bar.finish();
                }
                Progress::Message(msg) => {
                    if state.bar.is_finished() {
                        state.bar.set_message(msg);
                    } else {
                        state.bar.println(format!("  {msg}"));
                    }
                }
            }
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "eta",
            |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        )
        .progress_chars("##-")
}

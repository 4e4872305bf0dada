use crate::ui::progress_message::ProgressMessage;
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

/// Progress over the units of one run, fed by the generator's channel
pub struct ProgressManager {
    units: ProgressBar,
    handle: Option<thread::JoinHandle<usize>>,
}

impl ProgressManager {
    pub fn new(total_units: usize) -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let units = if console::Term::stdout().is_term() {
            ProgressBar::new(total_units as u64).with_message("Generating bindings")
        } else {
            ProgressBar::hidden()
        };

        let bar = units.clone();
        let handle = thread::spawn(move || {
            let mut failures = 0;
            for msg in rx {
                match msg {
                    ProgressMessage::Started { total } => {
                        bar.set_length(total as u64);
                        bar.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::UnitFinished { unit, ok } => {
                        if !ok {
                            failures += 1;
                        }
                        bar.inc(1);
                        bar.set_message(format!("Generated: {}", unit));
                    }
                    ProgressMessage::Finished => {
                        bar.finish_and_clear();
                        break;
                    }
                }
            }
            failures
        });

        (
            Self {
                units,
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Wait for the run to finish and return the number of failed units
    pub fn join(&mut self) -> usize {
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or(0)
    }

    pub fn finish_with_summary(&mut self, duration: Duration, units: usize, files: usize) {
        let failures = self.join();
        self.units.finish_and_clear();
        println!();
        let style = if failures == 0 {
            theme().success.clone()
        } else {
            theme().error.clone()
        };
        println!(
            "{} {}",
            Icons::CHECK.style(style.clone()),
            format!("Complete in {}", HumanDuration(duration)).style(style)
        );
        println!(
            "  {} {}  {} {}  {} {}",
            Icons::PACKAGE.style(theme().dim.clone()),
            units,
            Icons::FILE.style(theme().dim.clone()),
            files,
            Icons::CROSS.style(theme().dim.clone()),
            failures
        );
    }
}

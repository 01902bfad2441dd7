//! The interactive loop over one loaded transaction log.

use super::report::{display_banner, display_unresolved};
use super::terminal::Terminal;
use super::ui;
use crate::core::aggregate::{accumulate, summarize};
use crate::core::config::{AppConfig, SessionCommand};
use crate::core::ledger::{filter_by_category, filter_by_date_range, filter_by_description};
use crate::core::{DateRange, Ledger, RateResolver, Summary, UnrecognizedEntry};
use anyhow::Result;
use tracing::{debug, info};

const COMMAND_PROMPT: &str = "Manually calculate the timeframe or recalculate (y/n/r)? ";
const START_PROMPT: &str = "Please enter start time (YYYY-MM-DD): ";
const END_PROMPT: &str = "Please enter end time (YYYY-MM-DD): ";
const WAGERING_TITLE: &str = "Total Wagering";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial full-range pass computed and shown.
    Loaded,
    AwaitingCommand,
    Recalculating,
    Restarting,
    Exiting,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Quit,
    /// Go back to file selection with nothing carried over.
    Restart,
}

/// Results of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// `None` for the full, unfiltered range.
    pub range: Option<DateRange>,
    pub wins: Summary,
    pub wagering: Summary,
    /// Every currency left unconverted in this pass, wins first.
    pub unresolved: Vec<UnrecognizedEntry>,
}

pub struct Session<'a> {
    ledger: Ledger,
    config: &'a AppConfig,
    resolver: &'a RateResolver,
    state: SessionState,
    report: Option<PassReport>,
}

impl<'a> Session<'a> {
    pub fn new(ledger: Ledger, config: &'a AppConfig, resolver: &'a RateResolver) -> Self {
        Session {
            ledger,
            config,
            resolver,
            state: SessionState::Loaded,
            report: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent successful pass.
    pub fn report(&self) -> Option<&PassReport> {
        self.report.as_ref()
    }

    /// Aggregates wagering and wins, restricted to `range` when given.
    pub async fn run_pass(&self, range: Option<&DateRange>) -> PassReport {
        let rows = self.ledger.rows();
        let wagering_rows = filter_by_category(rows, &self.config.categories.wagering);
        let win_rows = filter_by_description(rows, &self.config.categories.win);
        let (wagering_rows, win_rows) = match range {
            Some(range) => (
                filter_by_date_range(wagering_rows, range),
                filter_by_date_range(win_rows, range),
            ),
            None => (wagering_rows, win_rows),
        };
        debug!(
            wagering = wagering_rows.len(),
            wins = win_rows.len(),
            "Selected rows"
        );

        let wagering_totals = accumulate(wagering_rows, |r| r.raw_amount.as_str());
        let win_totals = accumulate(win_rows, |r| r.raw_amount.as_str());

        let pb = ui::new_spinner("Resolving prices...");
        let tick = || pb.inc(1);
        let wins = summarize(&win_totals, self.resolver, &tick).await;
        let wagering = summarize(&wagering_totals, self.resolver, &tick).await;
        pb.finish_and_clear();

        let unresolved = wins
            .unresolved
            .iter()
            .chain(&wagering.unresolved)
            .cloned()
            .collect();

        PassReport {
            range: range.copied(),
            wins,
            wagering,
            unresolved,
        }
    }

    /// Shows the initial pass, then serves commands until quit or restart.
    pub async fn run(&mut self, terminal: &mut dyn Terminal) -> Result<SessionExit> {
        terminal.print(&display_banner(
            &self.ledger,
            &self.config.categories.wagering,
        ));
        let report = self.run_pass(None).await;
        self.show(terminal, &report);
        self.report = Some(report);
        self.state = SessionState::Loaded;

        loop {
            self.state = SessionState::AwaitingCommand;
            let Some(answer) = terminal.prompt(COMMAND_PROMPT)? else {
                return Ok(self.exit(terminal));
            };

            match self.config.commands.lookup(&answer) {
                Some(SessionCommand::Recalculate) => {
                    self.state = SessionState::Recalculating;
                    if !self.recalculate(terminal).await? {
                        return Ok(self.exit(terminal));
                    }
                }
                Some(SessionCommand::Quit) => return Ok(self.exit(terminal)),
                Some(SessionCommand::Restart) => {
                    self.state = SessionState::Restarting;
                    info!("Restarting with a new file");
                    return Ok(SessionExit::Restart);
                }
                None => terminal.print(&ui::style_text(
                    "Invalid choice, please enter y/n/r.",
                    ui::StyleType::Error,
                )),
            }
        }
    }

    fn exit(&mut self, terminal: &mut dyn Terminal) -> SessionExit {
        self.state = SessionState::Exiting;
        terminal.print("Exiting...");
        SessionExit::Quit
    }

    /// Returns `false` when the input closed before both dates were read.
    async fn recalculate(&mut self, terminal: &mut dyn Terminal) -> Result<bool> {
        let Some(start) = terminal.prompt(START_PROMPT)? else {
            return Ok(false);
        };
        let Some(end) = terminal.prompt(END_PROMPT)? else {
            return Ok(false);
        };

        let range = match DateRange::parse(&start, &end) {
            Ok(range) => range,
            Err(e) => {
                terminal.print(&ui::style_text(
                    &format!("Error parsing dates: {e}"),
                    ui::StyleType::Error,
                ));
                return Ok(true);
            }
        };

        let report = self.run_pass(Some(&range)).await;
        self.show(terminal, &report);
        self.report = Some(report);
        Ok(true)
    }

    fn show(&self, terminal: &mut dyn Terminal, report: &PassReport) {
        if let Some(range) = &report.range {
            terminal.print(&format!(
                "{} {range}",
                ui::style_text("Time frame:", ui::StyleType::TotalLabel)
            ));
        }
        terminal.print(&ui::separator());
        terminal.print(&report.wins.display_as_table(&self.config.categories.win));
        terminal.print(&ui::separator());
        terminal.print(&report.wagering.display_as_table(WAGERING_TITLE));
        if !report.unresolved.is_empty() {
            terminal.print(&display_unresolved(&report.unresolved));
        }
    }
}

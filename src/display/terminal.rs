// src/display/terminal.rs
//! Terminal view of the in-progress walk

use crate::{
    error::{Result, TrackerError},
    geo,
    session::{SessionState, WalkTracker},
    walk::format_duration,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    time::Duration,
};
use tokio::time::sleep;

pub struct TrackingDisplay {
    refresh: Duration,
}

impl TrackingDisplay {
    pub fn new() -> Self {
        Self {
            refresh: Duration::from_millis(250),
        }
    }

    /// Redraw the session view until tracking stops.
    ///
    /// Elapsed time is recomputed for every frame; once the session goes
    /// idle the loop exits on its own and nothing fires afterwards.
    pub async fn run(&self, tracker: &WalkTracker) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap).map_err(TrackerError::Io)?;

        while tracker.is_tracking() {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)).map_err(TrackerError::Io)?;

            let snapshot = tracker.snapshot();
            self.render(&mut stdout, &snapshot, tracker.elapsed_ms())?;

            stdout.flush().map_err(TrackerError::Io)?;
            sleep(self.refresh).await;
        }

        execute!(stdout, Show, EnableLineWrap).map_err(TrackerError::Io)?;
        Ok(())
    }

    fn render(&self, stdout: &mut impl Write, state: &SessionState, elapsed_ms: i64) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Walk Tracker - Live Session"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        self.render_position_section(stdout, state)?;
        self.render_walk_section(stdout, state, elapsed_ms)?;

        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to stop"),
            Print("\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        Ok(())
    }

    fn render_position_section(&self, stdout: &mut impl Write, state: &SessionState) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        match state.current_location {
            Some(coordinate) => {
                execute!(
                    stdout,
                    Print(format!("  Latitude:  {:>12.6}\n", coordinate.latitude)),
                    Print(format!("  Longitude: {:>12.6}\n\n", coordinate.longitude))
                )
                .map_err(TrackerError::Io)?;
            }
            None => {
                execute!(stdout, Print("  Waiting for fix...\n\n")).map_err(TrackerError::Io)?;
            }
        }

        Ok(())
    }

    fn render_walk_section(
        &self,
        stdout: &mut impl Write,
        state: &SessionState,
        elapsed_ms: i64,
    ) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("WALK:\n"),
            ResetColor
        )
        .map_err(TrackerError::Io)?;

        let (points, distance) = state
            .current_walk
            .as_ref()
            .map_or((0, 0.0), |walk| {
                (walk.point_count(), geo::distance_km(&walk.coordinates))
            });

        execute!(
            stdout,
            Print(format!("  Elapsed:   {:>12}\n", format_duration(elapsed_ms))),
            Print(format!("  Points:    {:>12}\n", points)),
            Print(format!("  Distance:  {:>9.3} km\n\n", distance))
        )
        .map_err(TrackerError::Io)?;

        Ok(())
    }
}

impl Default for TrackingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

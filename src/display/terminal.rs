// src/display/terminal.rs
//! Terminal dashboard for a recording session

use super::{format_distance, format_elapsed};
use crate::{
    error::Result,
    gps::LocationFix,
    session::{SessionSnapshot, SessionState},
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::watch;
use tokio::time::sleep;

pub struct TerminalDisplay {
    refresh: Duration,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            refresh: Duration::from_secs(1),
        }
    }

    /// Redraw the dashboard until `running` is cleared
    pub async fn run<F>(
        &self,
        snapshots: watch::Receiver<SessionSnapshot>,
        latest_fix: F,
        running: Arc<AtomicBool>,
    ) -> Result<()>
    where
        F: Fn() -> Option<LocationFix>,
    {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        while running.load(Ordering::Relaxed) {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;

            let snapshot = snapshots.borrow().clone();
            self.render(&mut stdout, &snapshot, latest_fix().as_ref())?;

            stdout.flush()?;
            sleep(self.refresh).await;
        }

        execute!(stdout, Show, EnableLineWrap)?;
        Ok(())
    }

    /// Render one frame of the dashboard
    pub fn render(
        &self,
        out: &mut impl Write,
        snapshot: &SessionSnapshot,
        latest_fix: Option<&LocationFix>,
    ) -> Result<()> {
        let (status, color) = match snapshot.state {
            SessionState::Recording => ("RECORDING", Color::Red),
            SessionState::Stopped => ("STOPPED", Color::Yellow),
            SessionState::Idle => ("IDLE", Color::Grey),
        };

        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\nRoute Recorder\n"),
            Print("=".repeat(60)),
            Print("\n"),
            SetForegroundColor(color),
            Print(status),
            ResetColor,
        )?;
        if let Some(id) = snapshot.session_id {
            queue!(out, Print(format!("  session {}", id)))?;
        }
        queue!(out, Print("\n\n"))?;

        queue!(
            out,
            SetForegroundColor(Color::Cyan),
            Print("TRIP:\n"),
            ResetColor,
            Print(format!("  Elapsed:   {:>12}\n", format_elapsed(snapshot.elapsed_millis))),
            Print(format!("  Distance:  {:>12}\n", format_distance(snapshot.cumulative_distance_m))),
            Print(format!("  Speed:     {:>9.1} km/h\n", snapshot.current_speed_kmh)),
            Print(format!("  Points:    {:>12}\n", snapshot.trace.len())),
            Print(format!("  Waypoints: {:>12}\n\n", snapshot.waypoints.len())),
        )?;

        queue!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\n"),
            ResetColor
        )?;
        match latest_fix {
            Some(fix) => {
                queue!(
                    out,
                    Print(format!("  Latitude:  {:>12.6}°\n", fix.coordinate.latitude)),
                    Print(format!("  Longitude: {:>12.6}°\n", fix.coordinate.longitude)),
                )?;
                match fix.accuracy_m {
                    Some(acc) => queue!(out, Print(format!("  Accuracy:  {:>10.1} m\n", acc)))?,
                    None => queue!(out, Print("  Accuracy:       unknown\n"))?,
                }
            }
            None => queue!(out, Print("  Waiting for fix...\n"))?,
        }

        if let Some(last) = snapshot.waypoints.last() {
            queue!(
                out,
                SetForegroundColor(Color::Magenta),
                Print("\nLAST WAYPOINT:\n"),
                ResetColor,
                Print(format!("  {}", last.name)),
            )?;
            if !last.description.is_empty() {
                queue!(out, Print(format!(" - {}", last.description)))?;
            }
            queue!(out, Print("\n"))?;
        }

        queue!(
            out,
            SetForegroundColor(Color::Green),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\nwp <name> [| description] adds a waypoint, stop or Ctrl+C ends the trip\n"),
            ResetColor
        )?;
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::session::{SessionId, Waypoint};
    use crate::track::LogView;

    #[test]
    fn test_render_recording_snapshot() {
        let snapshot = SessionSnapshot {
            session_id: Some(SessionId(12)),
            state: SessionState::Recording,
            is_recording: true,
            elapsed_millis: 65_000,
            cumulative_distance_m: 1_530.0,
            current_speed_kmh: 12.5,
            trace: Default::default(),
            waypoints: LogView::from(vec![Waypoint {
                coordinate: Coordinate { latitude: 1.0, longitude: 2.0 },
                name: "Summit".to_string(),
                description: "cairn".to_string(),
                photo_ref: None,
                captured_at_millis: 0,
            }]),
        };

        let mut out = Vec::new();
        TerminalDisplay::new().render(&mut out, &snapshot, None).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("RECORDING"));
        assert!(text.contains("00:01:05"));
        assert!(text.contains("1.53 km"));
        assert!(text.contains("Summit - cairn"));
        assert!(text.contains("Waiting for fix"));
    }

    #[test]
    fn test_render_position() {
        let fix = LocationFix::new(Coordinate { latitude: 48.117, longitude: 11.517 }, Some(4.0), 0);
        let mut out = Vec::new();
        TerminalDisplay::new()
            .render(&mut out, &SessionSnapshot::default(), Some(&fix))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("IDLE"));
        assert!(text.contains("48.117000"));
        assert!(text.contains("4.0 m"));
    }
}

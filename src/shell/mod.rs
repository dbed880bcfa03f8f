use core::fmt::Write;

use crate::plc::types::{PlcSnapshot, PlcStatus};
use crate::shared_state::PlcEvent;

/// Handle one bench shell line.
///
/// Responses go to `out`. Commands that change the core return the event the
/// caller should publish on the PLC event channel.
pub fn handle_shell<W: Write>(
    line: &str,
    snapshot: &PlcSnapshot,
    out: &mut W,
) -> Result<Option<PlcEvent>, core::fmt::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    // Split into top-level command and args
    let (cmd, args) = match line.split_once(char::is_whitespace) {
        Some((c, rest)) => (c, rest.trim_start()),
        None => (line, ""),
    };

    match cmd {
        "plc" => handle_plc(args, snapshot, out),
        _ => {
            write!(out, "no shell command: {}\r\n", cmd)?;
            Ok(None)
        }
    }
}

fn handle_plc<W: Write>(
    args: &str,
    snapshot: &PlcSnapshot,
    out: &mut W,
) -> Result<Option<PlcEvent>, core::fmt::Error> {
    let mut words = args.split_whitespace();

    match words.next() {
        Some("status") => {
            write_status(snapshot, out)?;
            Ok(None)
        }
        Some("track") => match words.next() {
            Some("on") => {
                out.write_str("PLC: debug track on\r\n")?;
                Ok(Some(PlcEvent::DebugTrack(true)))
            }
            Some("off") => {
                out.write_str("PLC: debug track off\r\n")?;
                Ok(Some(PlcEvent::DebugTrack(false)))
            }
            _ => {
                out.write_str("usage: plc track <on|off>\r\n")?;
                Ok(None)
            }
        },
        Some("vote") => match words.next().and_then(parse_status) {
            Some(status) => {
                write!(out, "PLC: enable vote {:?} queued\r\n", status)?;
                Ok(Some(PlcEvent::EnableVote(status)))
            }
            None => {
                out.write_str("usage: plc vote <not_allowed|disable|wait|enable>\r\n")?;
                Ok(None)
            }
        },
        Some("help") | None => {
            out.write_str("plc status | plc track <on|off> | plc vote <state> | plc help\r\n")?;
            Ok(None)
        }
        Some(other) => {
            write!(out, "PLC: unknown subcommand: {}\r\n", other)?;
            Ok(None)
        }
    }
}

fn parse_status(word: &str) -> Option<PlcStatus> {
    match word {
        "not_allowed" => Some(PlcStatus::NotAllowed),
        "disable" => Some(PlcStatus::Disable),
        "wait" => Some(PlcStatus::Wait),
        "enable" => Some(PlcStatus::Enable),
        _ => None,
    }
}

fn write_status<W: Write>(s: &PlcSnapshot, out: &mut W) -> core::fmt::Result {
    write!(
        out,
        "PLC: status={:?} current={} mA enable_cnts={}\r\n",
        s.status, s.current_ma, s.enable_cnts
    )?;
    write!(
        out,
        "PLC: ufcs online={} charging={} wired={} ui_soc={} sm_soc={}\r\n",
        s.link.ufcs_online, s.link.ufcs_charging, s.link.wired_online, s.link.ui_soc, s.link.smooth_soc
    )?;
    write!(
        out,
        "PLC: avg ibat={} mA ibus={} mA streak low={} high={}\r\n",
        s.avg_battery_ma, s.avg_bus_ma, s.low_battery_streak, s.high_bus_streak
    )?;
    write!(
        out,
        "PLC: session={} pulse={} track={}\r\n",
        s.session_active, s.pulse_pending, s.debug_track
    )
}

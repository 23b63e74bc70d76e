use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::cmd::decode::DecodedFrame;
use crate::cmd::simulate::SimulationReport;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_report(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut events = table(vec!["SEQ", "STREAM", "EVENT", "DETAIL"]);
            for event in &report.events {
                events.add_row(vec![
                    event.seq.to_string(),
                    event.stream_id.to_string(),
                    event.event.to_string(),
                    event.detail.clone(),
                ]);
            }
            println!("{events}");

            let mut outbound = table(vec!["TYPE", "STREAM", "UPDATE"]);
            for frame in &report.outbound {
                outbound.add_row(vec![
                    frame.frame_type.to_string(),
                    frame.stream_id.to_string(),
                    frame.update.map(|u| u.to_string()).unwrap_or_default(),
                ]);
            }
            println!("{outbound}");

            if !report.credits.is_empty() {
                let mut credits = table(vec!["STREAM", "UPDATE", "TOTAL"]);
                for credit in &report.credits {
                    credits.add_row(vec![
                        credit.stream_id.to_string(),
                        credit.update.to_string(),
                        credit.total.to_string(),
                    ]);
                }
                println!("{credits}");
            }

            let stats = report.stats;
            let mut summary = table(vec![
                "PARTITION",
                "DRAINED",
                "DISPATCHED",
                "ACCEPTED",
                "CORRELATED",
                "REJECTED",
                "DROPPED",
            ]);
            summary.add_row(vec![
                report.partition.clone(),
                stats.drained.to_string(),
                stats.dispatched.to_string(),
                stats.accepted.to_string(),
                stats.correlated.to_string(),
                stats.rejected.to_string(),
                stats.dropped.to_string(),
            ]);
            println!("{summary}");

            if let Some(error) = &report.error {
                println!("error: {error}");
            }
        }
        OutputFormat::Pretty => {
            for event in &report.events {
                println!(
                    "#{} stream={} {} {}",
                    event.seq, event.stream_id, event.event, event.detail
                );
            }
            for frame in &report.outbound {
                match frame.update {
                    Some(update) => println!(
                        "out {} stream={} update={update}",
                        frame.frame_type, frame.stream_id
                    ),
                    None => println!("out {} stream={}", frame.frame_type, frame.stream_id),
                }
            }
            for credit in &report.credits {
                println!(
                    "credit stream={} update={} total={}",
                    credit.stream_id, credit.update, credit.total
                );
            }
            let stats = report.stats;
            println!(
                "{} drained={} dispatched={} accepted={} correlated={} rejected={} dropped={}",
                report.partition,
                stats.drained,
                stats.dispatched,
                stats.accepted,
                stats.correlated,
                stats.rejected,
                stats.dropped
            );
            if let Some(error) = &report.error {
                println!("error: {error}");
            }
        }
    }
}

pub fn print_decoded(frame: &DecodedFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(frame),
        OutputFormat::Table => {
            let mut out = table(vec!["FIELD", "VALUE"]);
            out.add_row(vec!["type".to_string(), frame.frame_type.to_string()]);
            out.add_row(vec!["type_id".to_string(), format!("{:#010x}", frame.type_id)]);
            out.add_row(vec!["stream_id".to_string(), frame.stream_id.to_string()]);
            out.add_row(vec!["size".to_string(), frame.size.to_string()]);
            if let Some(reference_id) = frame.reference_id {
                out.add_row(vec!["reference_id".to_string(), reference_id.to_string()]);
            }
            if let Some(correlation_id) = frame.correlation_id {
                out.add_row(vec!["correlation_id".to_string(), correlation_id.to_string()]);
            }
            if let Some(update) = frame.update {
                out.add_row(vec!["update".to_string(), update.to_string()]);
            }
            if let Some(payload) = &frame.payload {
                out.add_row(vec!["payload".to_string(), payload.clone()]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            let mut line = format!(
                "{} stream={} size={}",
                frame.frame_type, frame.stream_id, frame.size
            );
            if let Some(reference_id) = frame.reference_id {
                line.push_str(&format!(" reference={reference_id}"));
            }
            if let Some(correlation_id) = frame.correlation_id {
                line.push_str(&format!(" correlation={correlation_id}"));
            }
            if let Some(update) = frame.update {
                line.push_str(&format!(" update={update}"));
            }
            if let Some(payload) = &frame.payload {
                line.push_str(&format!(" payload={payload}"));
            }
            println!("{line}");
        }
    }
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

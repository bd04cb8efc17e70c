//! Plain-text competition report.

use std::fmt::Write;

use sprint_bracket::{Competition, Placing, RiderId, rider::format_seconds};

fn rider_line(competition: &Competition, placing: &str, rider: Option<RiderId>) -> String {
    match rider.and_then(|id| competition.rider(id)) {
        Some(rider) => format!(
            "{placing:>4}  {:>4}  {:<28} {}",
            rider.bib,
            rider.full_name(),
            rider.team
        ),
        None => format!("{placing:>4}  {:>4}  (open)", ""),
    }
}

/// Classification followed by the DNF and DQ lists.
pub fn render(competition: &Competition) -> String {
    let results = competition.results();
    let mut out = String::new();

    let _ = writeln!(out, "{} ({})", competition.name(), competition.kind());
    if let Some(secs) = competition.estimated_duration_secs() {
        let _ = writeln!(out, "Estimated duration: {}", format_seconds(secs));
    }
    let _ = writeln!(out);

    for row in &results.rows {
        let placing = match row.placing {
            Placing::Rank(rank) => rank.to_string(),
            Placing::Status(status) => status.to_string(),
        };
        let _ = writeln!(out, "{}", rider_line(competition, &placing, row.rider));
    }
    for (heading, riders) in [("DNF", &results.dnfs), ("DQ", &results.dqs)] {
        if riders.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{heading}:");
        for rider in riders {
            let _ = writeln!(out, "{}", rider_line(competition, heading, Some(*rider)));
        }
    }
    out
}

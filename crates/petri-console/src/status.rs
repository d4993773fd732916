//! Status block printed after every input line.

use petri_control::dispatch::HELP_TEXT;
use petri_control::ticker::format_elapsed;
use petri_control::RenderView;
use petri_types::SnapshotSummary;

/// Render the controller view as a plain-text block.
pub fn render(view: &RenderView, help_visible: bool) -> String {
    let mut lines = Vec::new();

    match (&view.simulation_id, &view.run_name) {
        (Some(id), Some(name)) => lines.push(format!("simulation  {name} ({id})")),
        _ => lines.push("simulation  none loaded".to_owned()),
    }
    let generation = view
        .generation
        .map_or_else(|| "-".to_owned(), |g| g.to_string());
    lines.push(format!(
        "phase       {:?}{}{}",
        view.phase,
        if view.busy { " [busy]" } else { "" },
        if view.live { "" } else { " [offline cache]" },
    ));
    lines.push(format!(
        "generation  {generation}   elapsed {}",
        format_elapsed(view.elapsed_seconds)
    ));

    let stats = &view.statistics;
    lines.push(format!(
        "population  {} total, {} resistant, {} sensitive ({:.1}% resistant, {})",
        stats.total,
        stats.resistant,
        stats.sensitive,
        stats.resistance_percentage,
        if stats.live_data { "engine series" } else { "local count" },
    ));

    let target = view
        .target_generation
        .map_or_else(|| "-".to_owned(), |t| t.to_string());
    lines.push(format!(
        "controls    speed {}   target {target}   autosave {}",
        view.speed,
        if view.autosave { "on" } else { "off" },
    ));

    if let Some(error) = &view.error {
        lines.push(format!("error       {error} (dismiss to clear)"));
    }
    if help_visible {
        lines.push(String::new());
        lines.push(HELP_TEXT.to_owned());
    }
    lines.join("\n")
}

/// Render the load dialog listing.
pub fn render_listing(simulations: &[SnapshotSummary]) -> String {
    if simulations.is_empty() {
        return "no simulations".to_owned();
    }
    simulations
        .iter()
        .map(|s| {
            format!(
                "{}  {:<30} generation {:>6}  {:?}",
                s.id, s.name, s.generation, s.run_state
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Event handling and live output

use console::{Style, Term};
use shardex_events::{describe, EngineEvent, EventMessage, ExecutionStage, OperationEvent};

/// Renders lifecycle events while an operation runs
pub struct EventHandler {
    /// Print events as they arrive
    live: bool,
    /// Keep events for the final JSON report
    collect: bool,
    collected: Vec<EventMessage>,
    term: Term,
    colors: bool,
}

impl EventHandler {
    /// Create new event handler
    pub fn new(enabled: bool, json_mode: bool) -> Self {
        let term = Term::stderr();
        let colors = term.features().colors_supported();
        Self {
            live: enabled && !json_mode,
            collect: enabled && json_mode,
            collected: Vec::new(),
            term,
            colors,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        if self.live {
            let line = format!(
                "{} {}",
                message.meta.timestamp.format("%H:%M:%S%.3f"),
                describe(&message.event)
            );
            let styled = if self.colors {
                style_for(&message.event).apply_to(line).to_string()
            } else {
                line
            };
            let _ = self.term.write_line(&styled);
        }
        if self.collect {
            self.collected.push(message);
        }
    }

    /// Events kept for the JSON report, if collection is enabled
    pub fn into_collected(self) -> Option<Vec<EventMessage>> {
        self.collect.then_some(self.collected)
    }
}

fn style_for(event: &EngineEvent) -> Style {
    match event {
        EngineEvent::Unit(unit) => match unit.stage {
            ExecutionStage::Started => Style::new().dim(),
            ExecutionStage::Succeeded => Style::new().green(),
            ExecutionStage::Failed { .. } => Style::new().red(),
        },
        EngineEvent::Operation(OperationEvent::Failed { .. }) => Style::new().red().bold(),
        EngineEvent::Operation(OperationEvent::Completed { absent, .. }) if *absent > 0 => {
            Style::new().yellow().bold()
        }
        EngineEvent::Operation(_) => Style::new().bold(),
    }
}

use senselog_config::CaptureConfig;
use senselog_core::capture::PathTemplate;
use senselog_core::{CaptureSettings, NodeId};

/// Maps the validated capture configuration onto capturer settings.
pub fn capture_settings(config: &CaptureConfig) -> CaptureSettings {
    let mut capture_nodes: Vec<NodeId> = config.nodes.iter().copied().map(NodeId).collect();
    capture_nodes.sort_unstable();
    capture_nodes.dedup();

    CaptureSettings {
        trigger_node: NodeId(config.trigger_node),
        start_marker: config.start_marker.clone(),
        capture_nodes,
        header: config.header.clone(),
        row_format: config.row_format,
        output: PathTemplate::new(&config.output, &config.run_id, &config.file_id),
    }
}

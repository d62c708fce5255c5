//! Fixed four-site demo scenario

use sdwan_path::{Link, NodeRole, Result, SdwanController, Sensitivity, TrafficFlow};

/// Sites: (id, role)
pub const SITES: [(&str, NodeRole); 4] = [
    ("HQ", NodeRole::Hub),
    ("Branch1", NodeRole::Cpe),
    ("Branch2", NodeRole::Cpe),
    ("CloudGW", NodeRole::Cloud),
];

/// Links: (a, b, latency ms, jitter ms, loss %, bandwidth Mbps, cost)
pub const LINKS: [(&str, &str, Link); 5] = [
    ("HQ", "Branch1", Link::new(30.0, 5.0, 0.1, 50.0, 1.0)),
    ("HQ", "Branch2", Link::new(40.0, 8.0, 0.2, 50.0, 1.0)),
    ("Branch1", "Branch2", Link::new(20.0, 3.0, 0.05, 20.0, 2.0)),
    ("Branch1", "CloudGW", Link::new(60.0, 15.0, 0.3, 100.0, 3.0)),
    ("Branch2", "CloudGW", Link::new(70.0, 20.0, 0.4, 100.0, 3.0)),
];

/// Populate a controller with the demo sites, links and flows
pub fn build(controller: &SdwanController) -> Result<()> {
    for (id, role) in SITES {
        controller.add_node(id, role)?;
    }
    for (a, b, link) in LINKS {
        controller.add_link(a, b, link)?;
    }

    controller.register_flow(
        "voip1",
        TrafficFlow::new("Branch1", "HQ", 0.5, 1, Sensitivity::Latency),
    )?;
    controller.register_flow(
        "backup1",
        TrafficFlow::new("Branch1", "CloudGW", 20.0, 4, Sensitivity::Throughput),
    )?;
    controller.register_flow(
        "video1",
        TrafficFlow::new("Branch2", "HQ", 5.0, 2, Sensitivity::Reliability),
    )?;
    Ok(())
}

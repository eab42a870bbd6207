use std::net::SocketAddr;

pub fn init_metrics() {
    let port: u16 = std::env::var("CHECKIN_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    println!("[metrics] Attempting to install Prometheus exporter on {}", addr);
    match builder.install() {
        Ok(()) => {
            println!("[metrics] Prometheus exporter installed and listening on http://{}/metrics", addr);
        }
        Err(e) => {
            println!("[metrics] Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

pub fn participant_registered() {
    ::metrics::counter!("participants_registered_total").increment(1);
}

pub fn login_succeeded(is_admin: bool) {
    let role = if is_admin { "administrator" } else { "participant" };
    ::metrics::counter!("logins_total", "role" => role).increment(1);
}

pub fn event_registration_created() {
    ::metrics::counter!("event_registrations_total").increment(1);
}

pub fn custom_entry_created(catalog: &'static str) {
    ::metrics::counter!("catalog_custom_entries_created_total", "catalog" => catalog).increment(1);
}

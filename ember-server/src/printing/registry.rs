//! PrinterRegistry - printer configuration and connectivity probing
//!
//! Owns printer CRUD per restaurant. Validation collects every violation
//! before failing so the caller can surface all of them at once, and builds
//! the typed connection variant only from a clean config.

use shared::util::new_id;
use shared::{
    ConnectionKind, Printer, PrinterConnection, PrinterCreate, PrinterStatus, PrinterUpdate,
    TestConnectionReport,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use super::{PrintJobQueue, PrintingError, PrintingResult, TransportFactory};
use crate::db::Storage;
use crate::utils::validation::{require_text, Violations};
use crate::utils::Clock;

/// Printer registry
pub struct PrinterRegistry {
    storage: Storage,
    queue: Arc<PrintJobQueue>,
    transports: Arc<dyn TransportFactory>,
    clock: Arc<dyn Clock>,
    probe_timeout: Duration,
}

impl PrinterRegistry {
    pub fn new(
        storage: Storage,
        queue: Arc<PrintJobQueue>,
        transports: Arc<dyn TransportFactory>,
        clock: Arc<dyn Clock>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            queue,
            transports,
            clock,
            probe_timeout,
        }
    }

    /// Register a printer for a restaurant
    pub fn create(&self, restaurant_id: &str, payload: PrinterCreate) -> PrintingResult<Printer> {
        let connection = validate_config(
            &payload.name,
            payload.connection_type,
            payload.ip_address.as_deref(),
            payload.port,
            payload.usb_device.as_deref(),
        )?;

        let now = self.clock.now_millis();
        let printer = Printer {
            id: new_id(),
            restaurant_id: restaurant_id.to_string(),
            name: payload.name,
            kind: payload.kind,
            connection,
            auto_print_orders: payload.auto_print_orders,
            enabled: payload.enabled,
            status: PrinterStatus::Unknown,
            created_at: now,
            updated_at: now,
        };
        self.storage.store_printer(&printer)?;
        tracing::info!(
            printer_id = %printer.id,
            restaurant_id = %restaurant_id,
            name = %printer.name,
            connection = ?printer.connection.kind(),
            "Printer registered"
        );
        Ok(printer)
    }

    /// Merge a partial update, then re-validate the full configuration
    pub fn update(
        &self,
        restaurant_id: &str,
        printer_id: &str,
        payload: PrinterUpdate,
    ) -> PrintingResult<Printer> {
        let mut printer = self.owned(restaurant_id, printer_id)?;

        let name = payload.name.unwrap_or_else(|| printer.name.clone());
        let connection_kind = payload
            .connection_type
            .unwrap_or_else(|| printer.connection.kind());

        // Carry over fields of the existing connection unless overridden
        let (existing_ip, existing_port, existing_usb) = match &printer.connection {
            PrinterConnection::Network { ip_address, port } => {
                (Some(ip_address.clone()), Some(u32::from(*port)), None)
            }
            PrinterConnection::Usb { usb_device } => (None, None, Some(usb_device.clone())),
            PrinterConnection::Bluetooth => (None, None, None),
        };
        let ip_address = payload.ip_address.or(existing_ip);
        let port = payload.port.or(existing_port);
        let usb_device = payload.usb_device.or(existing_usb);

        let connection = validate_config(
            &name,
            connection_kind,
            ip_address.as_deref(),
            port,
            usb_device.as_deref(),
        )?;

        printer.name = name;
        printer.connection = connection;
        if let Some(kind) = payload.kind {
            printer.kind = kind;
        }
        if let Some(auto_print) = payload.auto_print_orders {
            printer.auto_print_orders = auto_print;
        }
        if let Some(enabled) = payload.enabled {
            printer.enabled = enabled;
        }
        printer.updated_at = self.clock.now_millis();

        self.storage.store_printer(&printer)?;
        Ok(printer)
    }

    /// Remove a printer
    ///
    /// Queued jobs referencing it are settled as failed with "printer
    /// removed" so the queue never points at a dangling device.
    pub fn delete(&self, restaurant_id: &str, printer_id: &str) -> PrintingResult<()> {
        let printer = self.owned(restaurant_id, printer_id)?;
        let failed = self
            .queue
            .fail_jobs_for_printer(&printer.id, "printer removed")?;
        self.storage.remove_printer(&printer.id)?;
        tracing::info!(
            printer_id = %printer.id,
            cascaded_jobs = failed,
            "Printer removed"
        );
        Ok(())
    }

    /// Fetch a printer, checking restaurant ownership
    pub fn get(&self, restaurant_id: &str, printer_id: &str) -> PrintingResult<Printer> {
        self.owned(restaurant_id, printer_id)
    }

    /// List a restaurant's printers
    pub fn list(&self, restaurant_id: &str, enabled_only: bool) -> PrintingResult<Vec<Printer>> {
        let mut printers = self.storage.list_printers(restaurant_id)?;
        if enabled_only {
            printers.retain(|p| p.enabled);
        }
        Ok(printers)
    }

    /// Probe a printer's reachability
    ///
    /// Always produces a report; the probe outcome is data, not an error.
    /// Updates the printer's status to `online` or `error` accordingly.
    pub async fn test_connection(
        &self,
        restaurant_id: &str,
        printer_id: &str,
    ) -> PrintingResult<TestConnectionReport> {
        let printer = self.owned(restaurant_id, printer_id)?;

        let outcome = match self.transports.connect(&printer.connection) {
            Ok(transport) => {
                match tokio::time::timeout(self.probe_timeout, transport.probe()).await {
                    Ok(Ok(())) => Ok("printer is reachable".to_string()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "probe timed out after {}ms",
                        self.probe_timeout.as_millis()
                    )),
                }
            }
            Err(e) => Err(e.to_string()),
        };

        let (success, message, status) = match outcome {
            Ok(msg) => (true, msg, PrinterStatus::Online),
            Err(msg) => (false, msg, PrinterStatus::Error),
        };
        self.set_status(&printer.id, status)?;

        tracing::info!(
            printer_id = %printer.id,
            success,
            message = %message,
            "Printer connection test"
        );
        Ok(TestConnectionReport {
            success,
            message,
            timestamp: self.clock.now_millis(),
        })
    }

    /// Record the last known reachability (dispatcher outcome or probe)
    pub fn set_status(&self, printer_id: &str, status: PrinterStatus) -> PrintingResult<()> {
        if let Some(mut printer) = self.storage.get_printer(printer_id)? {
            if printer.status != status {
                printer.status = status;
                printer.updated_at = self.clock.now_millis();
                self.storage.store_printer(&printer)?;
            }
        }
        Ok(())
    }

    fn owned(&self, restaurant_id: &str, printer_id: &str) -> PrintingResult<Printer> {
        match self.storage.get_printer(printer_id)? {
            Some(p) if p.restaurant_id == restaurant_id => Ok(p),
            _ => Err(PrintingError::PrinterNotFound(printer_id.to_string())),
        }
    }
}

/// Validate a full printer configuration, collecting every violation
///
/// Returns the typed connection variant on success.
fn validate_config(
    name: &str,
    connection_kind: ConnectionKind,
    ip_address: Option<&str>,
    port: Option<u32>,
    usb_device: Option<&str>,
) -> PrintingResult<PrinterConnection> {
    let mut violations = Violations::new();

    require_text(&mut violations, name, "printer name");

    let connection = match connection_kind {
        ConnectionKind::Network => {
            let ip = match ip_address {
                Some(ip) if !ip.trim().is_empty() => {
                    if ip.parse::<IpAddr>().is_err() {
                        violations.push(format!("IP address '{ip}' is not valid"));
                    }
                    Some(ip.to_string())
                }
                _ => {
                    violations.push("IP address is required for network printers".to_string());
                    None
                }
            };
            let port = match port {
                Some(p) if (1..=65_535).contains(&p) => Some(p as u16),
                Some(p) => {
                    violations.push(format!("port {p} must be between 1 and 65535"));
                    None
                }
                None => {
                    violations.push("port is required for network printers".to_string());
                    None
                }
            };
            match (ip, port) {
                (Some(ip_address), Some(port)) if violations.is_empty() => {
                    Some(PrinterConnection::Network { ip_address, port })
                }
                _ => None,
            }
        }
        ConnectionKind::Usb => match usb_device {
            Some(device) if !device.trim().is_empty() => Some(PrinterConnection::Usb {
                usb_device: device.to_string(),
            }),
            _ => {
                violations.push("USB device path is required for USB printers".to_string());
                None
            }
        },
        ConnectionKind::Bluetooth => Some(PrinterConnection::Bluetooth),
    };

    match connection {
        Some(connection) if violations.is_empty() => Ok(connection),
        _ => Err(PrintingError::violations(violations.into_messages())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::{DeviceTransportFactory, RetryPolicy};
    use crate::utils::clock::ManualClock;
    use shared::PrinterKind;

    fn registry() -> PrinterRegistry {
        let storage = Storage::open_in_memory().unwrap();
        let clock = ManualClock::new(50_000);
        let queue = Arc::new(PrintJobQueue::new(
            storage.clone(),
            clock.clone(),
            RetryPolicy::default(),
        ));
        PrinterRegistry::new(
            storage,
            queue,
            Arc::new(DeviceTransportFactory::new(Duration::from_millis(300))),
            clock,
            Duration::from_millis(500),
        )
    }

    fn network_payload() -> PrinterCreate {
        PrinterCreate {
            name: "Kitchen main".to_string(),
            kind: PrinterKind::Kitchen,
            connection_type: ConnectionKind::Network,
            ip_address: Some("192.168.1.50".to_string()),
            port: Some(9100),
            usb_device: None,
            auto_print_orders: true,
            enabled: true,
        }
    }

    #[test]
    fn create_network_printer() {
        let reg = registry();
        let printer = reg.create("r-1", network_payload()).unwrap();
        assert_eq!(printer.status, PrinterStatus::Unknown);
        assert_eq!(
            printer.connection,
            PrinterConnection::Network {
                ip_address: "192.168.1.50".to_string(),
                port: 9100
            }
        );
    }

    #[test]
    fn network_without_ip_reports_ip_violation() {
        let reg = registry();
        let mut payload = network_payload();
        payload.ip_address = None;
        let err = reg.create("r-1", payload).unwrap_err();
        assert!(err.to_string().contains("IP address"));
    }

    #[test]
    fn network_port_out_of_range_reports_port_violation() {
        let reg = registry();
        let mut payload = network_payload();
        payload.port = Some(70_000);
        let err = reg.create("r-1", payload).unwrap_err();
        assert!(err.to_string().contains("port"));

        let mut payload = network_payload();
        payload.port = None;
        let err = reg.create("r-1", payload).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn usb_without_device_reports_usb_violation() {
        let reg = registry();
        let payload = PrinterCreate {
            name: "Labels".to_string(),
            kind: PrinterKind::Label,
            connection_type: ConnectionKind::Usb,
            ip_address: None,
            port: None,
            usb_device: None,
            auto_print_orders: false,
            enabled: true,
        };
        let err = reg.create("r-1", payload).unwrap_err();
        assert!(err.to_string().contains("USB device"));
    }

    #[test]
    fn all_violations_reported_at_once() {
        let reg = registry();
        let payload = PrinterCreate {
            name: "   ".to_string(),
            kind: PrinterKind::Kitchen,
            connection_type: ConnectionKind::Network,
            ip_address: None,
            port: Some(0),
            usb_device: None,
            auto_print_orders: false,
            enabled: true,
        };
        let err = reg.create("r-1", payload).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("name must not be empty"));
        assert!(msg.contains("IP address"));
        assert!(msg.contains("port"));
    }

    #[test]
    fn bluetooth_needs_no_extra_fields() {
        let reg = registry();
        let payload = PrinterCreate {
            name: "Counter".to_string(),
            kind: PrinterKind::Receipt,
            connection_type: ConnectionKind::Bluetooth,
            ip_address: None,
            port: None,
            usb_device: None,
            auto_print_orders: false,
            enabled: true,
        };
        let printer = reg.create("r-1", payload).unwrap();
        assert_eq!(printer.connection, PrinterConnection::Bluetooth);
    }

    #[test]
    fn update_merges_and_revalidates() {
        let reg = registry();
        let printer = reg.create("r-1", network_payload()).unwrap();

        // Port-only update keeps the existing IP
        let updated = reg
            .update(
                "r-1",
                &printer.id,
                PrinterUpdate {
                    port: Some(9101),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            updated.connection,
            PrinterConnection::Network {
                ip_address: "192.168.1.50".to_string(),
                port: 9101
            }
        );

        // Switching to USB without a device path is rejected
        let err = reg
            .update(
                "r-1",
                &printer.id,
                PrinterUpdate {
                    connection_type: Some(ConnectionKind::Usb),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("USB device"));
    }

    #[test]
    fn restaurant_mismatch_is_not_found() {
        let reg = registry();
        let printer = reg.create("r-1", network_payload()).unwrap();
        assert!(matches!(
            reg.update("r-2", &printer.id, PrinterUpdate::default()),
            Err(PrintingError::PrinterNotFound(_))
        ));
        assert!(matches!(
            reg.delete("r-2", &printer.id),
            Err(PrintingError::PrinterNotFound(_))
        ));
    }

    #[test]
    fn list_filters_disabled() {
        let reg = registry();
        reg.create("r-1", network_payload()).unwrap();
        let mut disabled = network_payload();
        disabled.name = "Backup".to_string();
        disabled.enabled = false;
        reg.create("r-1", disabled).unwrap();

        assert_eq!(reg.list("r-1", false).unwrap().len(), 2);
        let enabled = reg.list("r-1", true).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "Kitchen main");
    }

    #[tokio::test]
    async fn test_connection_unreachable_sets_error_status() {
        let reg = registry();
        let mut payload = network_payload();
        // TEST-NET-1 address: guaranteed unroutable, forces a timeout/refusal
        payload.ip_address = Some("192.0.2.1".to_string());
        let printer = reg.create("r-1", payload).unwrap();

        let started = std::time::Instant::now();
        let report = reg.test_connection("r-1", &printer.id).await.unwrap();
        assert!(!report.success);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.timestamp, 50_000);

        let after = reg.get("r-1", &printer.id).unwrap();
        assert_eq!(after.status, PrinterStatus::Error);
    }

    #[tokio::test]
    async fn test_connection_missing_printer_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.test_connection("r-1", "ghost").await,
            Err(PrintingError::PrinterNotFound(_))
        ));
    }
}

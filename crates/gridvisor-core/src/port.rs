use std::net::{Ipv4Addr, TcpListener};

use crate::error::{Error, Result};

/// Whether `127.0.0.1:port` can be bound right now.
#[must_use]
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// Probe `start, start + 1, ...` and return the first bindable port.
///
/// At most `attempts` ports are tried and the search never wraps past
/// `u16::MAX`. The answer is advisory: another process may take the port
/// before the dashboard binds it.
///
/// # Errors
///
/// Returns `Error::NoFreePort` if every candidate is taken.
pub fn find_free_port(start: u16, attempts: u16) -> Result<u16> {
    let found = (0..attempts)
        .map_while(|offset| start.checked_add(offset))
        .find(|port| *port != 0 && is_port_free(*port));

    match found {
        Some(port) => {
            tracing::debug!("Selected free port {port}");
            Ok(port)
        }
        None => Err(Error::NoFreePort { start, attempts }),
    }
}

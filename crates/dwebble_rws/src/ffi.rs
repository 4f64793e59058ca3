//! C ABI exports.
//!
//! Hosts that load the engine as a dynamic library drive it through these
//! `dwebble_rws_*` functions. A handle is a boxed [`FfiServer`] turned into a
//! raw pointer; it must be released with [`dwebble_rws_server_destroy`].
//!
//! Buffers referenced by a polled [`FfiEvent`] belong to the handle and stay
//! valid until the next poll on that same handle or its destruction.

use crate::server::Server;
use crate::types::{ConnectionId, EngineConfig, EngineEvent, EventCode, StatusCode};
use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Configuration as passed across the C ABI.
///
/// Null pointers are absent values. `bind_address` defaults to `127.0.0.1`.
#[repr(C)]
pub struct FfiServerConfig {
    pub port: u16,
    pub bind_address: *const c_char,
    /// Comma-separated subprotocols
    pub subprotocols: *const c_char,
    pub tls_cert_path: *const c_char,
    pub tls_key_path: *const c_char,
}

/// Event as passed across the C ABI.
///
/// `data` is non-null for every `MESSAGE_RECEIVED`, including zero-length
/// messages.
#[repr(C)]
pub struct FfiEvent {
    pub code: EventCode,
    pub connection_id: ConnectionId,
    pub data: *const u8,
    pub data_len: usize,
    pub error_message: *const c_char,
}

impl Default for FfiEvent {
    fn default() -> Self {
        Self {
            code: EventCode::NONE,
            connection_id: 0,
            data: ptr::null(),
            data_len: 0,
            error_message: ptr::null(),
        }
    }
}

/// Buffers backing the most recently polled event.
#[derive(Default)]
struct PolledBuffers {
    data: Option<Vec<u8>>,
    error: Option<CString>,
}

/// What a C handle points at.
pub struct FfiServer {
    server: Server,
    last_event: Mutex<PolledBuffers>,
}

/// Runs `f`, turning a panic into `fallback` so it never unwinds into C.
fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error!("💥 Panic caught at the C boundary");
            fallback
        }
    }
}

/// Reads an optional C string. Invalid UTF-8 is replaced lossily.
unsafe fn opt_string(s: *const c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    Some(CStr::from_ptr(s).to_string_lossy().into_owned())
}

unsafe fn server_ref<'a>(handle: *const FfiServer) -> Option<&'a FfiServer> {
    handle.as_ref()
}

/// Installs a default `tracing` subscriber (`RUST_LOG`, falling back to
/// `info`). Does nothing if one is already installed.
#[no_mangle]
pub extern "C" fn dwebble_rws_init_tracing() {
    guard((), || {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    })
}

/// Creates a server. Returns null if `config` is null or allocation fails.
///
/// # Safety
///
/// `config` must be null or point to a valid [`FfiServerConfig`] whose string
/// fields are null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_create(config: *const FfiServerConfig) -> *mut FfiServer {
    guard(ptr::null_mut(), || {
        let Some(config) = config.as_ref() else {
            return ptr::null_mut();
        };

        let engine_config = EngineConfig {
            port: config.port,
            bind_address: opt_string(config.bind_address).unwrap_or_else(|| "127.0.0.1".to_string()),
            subprotocols: opt_string(config.subprotocols),
            tls_cert_path: opt_string(config.tls_cert_path),
            tls_key_path: opt_string(config.tls_key_path),
        };

        match Server::new(engine_config) {
            Ok(server) => Box::into_raw(Box::new(FfiServer {
                server,
                last_event: Mutex::new(PolledBuffers::default()),
            })),
            Err(e) => {
                error!("❌ Failed to create engine server: {}", e);
                ptr::null_mut()
            }
        }
    })
}

/// Stops (if running) and frees a server. Null is ignored.
///
/// # Safety
///
/// `handle` must be null or a pointer from [`dwebble_rws_server_create`] that
/// has not been destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_destroy(handle: *mut FfiServer) {
    if handle.is_null() {
        return;
    }
    guard((), || drop(Box::from_raw(handle)))
}

/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_start(handle: *mut FfiServer) -> StatusCode {
    guard(StatusCode::RUNTIME_ERROR, || match server_ref(handle) {
        Some(ffi) => ffi.server.start(),
        None => StatusCode::INVALID_HANDLE,
    })
}

/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_stop(handle: *mut FfiServer) -> StatusCode {
    guard(StatusCode::RUNTIME_ERROR, || match server_ref(handle) {
        Some(ffi) => ffi.server.stop(),
        None => StatusCode::INVALID_HANDLE,
    })
}

/// Dequeues one event into `out_event`.
///
/// Returns `true` if an event was written. On `false` the out value is reset
/// to an empty `NONE` event.
///
/// # Safety
///
/// `handle` must be null or a live handle and `out_event` must be null or
/// point to writable memory for one [`FfiEvent`].
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_poll(handle: *mut FfiServer, out_event: *mut FfiEvent) -> bool {
    guard(false, || {
        let (Some(ffi), Some(out)) = (server_ref(handle), out_event.as_mut()) else {
            return false;
        };
        let Ok(mut buffers) = ffi.last_event.lock() else {
            *out = FfiEvent::default();
            return false;
        };

        // Releases the previous event's buffers.
        *buffers = PolledBuffers::default();

        let Some(event) = ffi.server.poll_event() else {
            *out = FfiEvent::default();
            return false;
        };

        let EngineEvent {
            code,
            connection_id,
            data,
            error,
        } = event;

        buffers.data = data;
        buffers.error = error.map(|message| {
            CString::new(message.replace('\0', " ")).unwrap_or_default()
        });

        *out = FfiEvent {
            code,
            connection_id,
            data: buffers.data.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
            data_len: buffers.data.as_ref().map_or(0, Vec::len),
            error_message: buffers.error.as_ref().map_or(ptr::null(), |e| e.as_ptr()),
        };
        true
    })
}

/// Queues a binary frame.
///
/// # Safety
///
/// `handle` must be null or a live handle; `data` must be valid for
/// `data_len` bytes (it may be null only when `data_len` is 0).
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_send(
    handle: *mut FfiServer,
    connection_id: ConnectionId,
    data: *const u8,
    data_len: usize,
) -> StatusCode {
    guard(StatusCode::RUNTIME_ERROR, || {
        let Some(ffi) = server_ref(handle) else {
            return StatusCode::INVALID_HANDLE;
        };
        let payload: &[u8] = match (data.is_null(), data_len) {
            (_, 0) => &[],
            (true, _) => return StatusCode::INVALID_PARAM,
            (false, len) => std::slice::from_raw_parts(data, len),
        };
        ffi.server.send(connection_id, payload)
    })
}

/// Queues a text frame. `text` must be NUL-terminated UTF-8.
///
/// # Safety
///
/// `handle` must be null or a live handle; `text` must be null or a valid
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_send_text(
    handle: *mut FfiServer,
    connection_id: ConnectionId,
    text: *const c_char,
) -> StatusCode {
    guard(StatusCode::RUNTIME_ERROR, || {
        let Some(ffi) = server_ref(handle) else {
            return StatusCode::INVALID_HANDLE;
        };
        if text.is_null() {
            return StatusCode::INVALID_PARAM;
        }
        match CStr::from_ptr(text).to_str() {
            Ok(text) => ffi.server.send_text(connection_id, text),
            Err(_) => StatusCode::INVALID_PARAM,
        }
    })
}

/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_disconnect(
    handle: *mut FfiServer,
    connection_id: ConnectionId,
) -> StatusCode {
    guard(StatusCode::RUNTIME_ERROR, || match server_ref(handle) {
        Some(ffi) => ffi.server.disconnect(connection_id),
        None => StatusCode::INVALID_HANDLE,
    })
}

/// Bound port, 0 for a null handle or a stopped server.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_get_port(handle: *const FfiServer) -> u16 {
    guard(0, || server_ref(handle).map_or(0, |ffi| ffi.server.port()))
}

/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_get_connection_count(handle: *const FfiServer) -> usize {
    guard(0, || server_ref(handle).map_or(0, |ffi| ffi.server.connection_count()))
}

/// Returns an owned `address:port` string, or null for a null handle.
/// Release it with [`dwebble_rws_free_string`].
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_server_info(handle: *const FfiServer) -> *mut c_char {
    guard(ptr::null_mut(), || {
        server_ref(handle)
            .and_then(|ffi| CString::new(ffi.server.info()).ok())
            .map_or(ptr::null_mut(), CString::into_raw)
    })
}

/// Frees a string returned by this library. Null is ignored.
///
/// # Safety
///
/// `s` must be null or a pointer from [`dwebble_rws_server_info`] that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn dwebble_rws_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    guard((), || drop(CString::from_raw(s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config(bind: &CStr) -> FfiServerConfig {
        FfiServerConfig {
            port: 0,
            bind_address: bind.as_ptr(),
            subprotocols: ptr::null(),
            tls_cert_path: ptr::null(),
            tls_key_path: ptr::null(),
        }
    }

    #[test]
    fn test_null_handles_are_rejected() {
        unsafe {
            assert_eq!(dwebble_rws_server_start(ptr::null_mut()), StatusCode::INVALID_HANDLE);
            assert_eq!(dwebble_rws_server_stop(ptr::null_mut()), StatusCode::INVALID_HANDLE);
            assert_eq!(
                dwebble_rws_server_send(ptr::null_mut(), 1, ptr::null(), 0),
                StatusCode::INVALID_HANDLE
            );
            assert_eq!(dwebble_rws_server_disconnect(ptr::null_mut(), 1), StatusCode::INVALID_HANDLE);
            assert_eq!(dwebble_rws_server_get_port(ptr::null()), 0);
            assert_eq!(dwebble_rws_server_get_connection_count(ptr::null()), 0);
            assert!(dwebble_rws_server_info(ptr::null()).is_null());
            assert!(dwebble_rws_server_create(ptr::null()).is_null());

            let mut event = FfiEvent::default();
            assert!(!dwebble_rws_server_poll(ptr::null_mut(), &mut event));

            dwebble_rws_server_destroy(ptr::null_mut());
            dwebble_rws_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn test_lifecycle_through_the_c_surface() {
        let bind = CString::new("127.0.0.1").expect("no interior nul");
        let config = loopback_config(&bind);

        unsafe {
            let handle = dwebble_rws_server_create(&config);
            assert!(!handle.is_null());

            assert_eq!(dwebble_rws_server_stop(handle), StatusCode::NOT_RUNNING);
            assert_eq!(dwebble_rws_server_start(handle), StatusCode::OK);
            assert_eq!(dwebble_rws_server_start(handle), StatusCode::ALREADY_RUNNING);

            let port = dwebble_rws_server_get_port(handle);
            assert_ne!(port, 0);

            let info = dwebble_rws_server_info(handle);
            assert!(!info.is_null());
            assert_eq!(
                CStr::from_ptr(info).to_str().expect("utf-8"),
                format!("127.0.0.1:{port}")
            );
            dwebble_rws_free_string(info);

            let mut event = FfiEvent::default();
            assert!(!dwebble_rws_server_poll(handle, &mut event));
            assert_eq!(event.code, EventCode::NONE);

            let text = CString::new("hi").expect("no interior nul");
            assert_eq!(
                dwebble_rws_server_send_text(handle, 42, text.as_ptr()),
                StatusCode::INVALID_HANDLE
            );
            assert_eq!(
                dwebble_rws_server_send(handle, 42, ptr::null(), 3),
                StatusCode::INVALID_PARAM
            );

            assert_eq!(dwebble_rws_server_stop(handle), StatusCode::OK);
            assert_eq!(dwebble_rws_server_get_port(handle), 0);
            dwebble_rws_server_destroy(handle);
        }
    }

    #[test]
    fn test_single_tls_path_is_an_invalid_parameter() {
        let bind = CString::new("127.0.0.1").expect("no interior nul");
        let cert = CString::new("/nonexistent/cert.pem").expect("no interior nul");
        let mut config = loopback_config(&bind);
        config.tls_cert_path = cert.as_ptr();

        unsafe {
            let handle = dwebble_rws_server_create(&config);
            assert!(!handle.is_null());
            assert_eq!(dwebble_rws_server_start(handle), StatusCode::INVALID_PARAM);
            dwebble_rws_server_destroy(handle);
        }
    }
}

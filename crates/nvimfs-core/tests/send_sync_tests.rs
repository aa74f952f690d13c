//! Tests to verify that all public types are Send + Sync as required.

use nvimfs_core::*;

const fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_domain_types_are_send_sync() {
    assert_send_sync::<SessionId>();
    assert_send_sync::<BufferNumber>();
    assert_send_sync::<RpcAddress>();
}

#[test]
fn test_config_is_send_sync() {
    assert_send_sync::<FsConfig>();
}

#[test]
fn test_error_is_send_sync() {
    // Errors cross task boundaries inside the FUSE session
    assert_send_sync::<Error>();
}

//! HTTP client for applications booted by testbed.
//!
//! [`TestClient`] targets `http://localhost:<port>/` and builds requests
//! fluently; terminal operations assert the response status (200 by
//! default) and decode the body.
//!
//! ```no_run
//! use testbed_client::TestClient;
//!
//! # tokio_test::block_on(async {
//! let client = TestClient::new(8080);
//! client.default_header("x-user", "alice");
//!
//! let widget: serde_json::Value = client
//!     .get("widgets/{id}", &[&42])
//!     .query_param("expand", ["owner"])
//!     .json()
//!     .await?;
//!
//! client.delete("widgets/{id}", &[&42]).expect_status(204).send().await?;
//! # Ok::<(), testbed_client::ClientError>(())
//! # });
//! ```

pub mod client;
pub mod error;
pub mod request;

pub use client::{TestClient, resolve_path};
pub use error::{ClientError, Result};
pub use request::{DEFAULT_EXPECTED_STATUS, RequestBuilder, TestResponse};

//! Names and default values used by the payment gate.

use std::time::Duration;

/// Namespace of the gate's configuration inside the host's extra-config map.
pub const PLUGIN_NAME: &str = "x402-payment-gate";

/// The only payment scheme the gate issues requirements for.
pub const SCHEME_EXACT: &str = "exact";

/// Signature value that skips facilitator verification when `debug_bypass` is enabled.
pub const DEBUG_BYPASS_SIGNATURE: &str = "0xDEBUG_BYPASS";

/// Facilitator path for payment verification, relative to the base URL.
pub const VERIFY_PATH: &str = "./api/v1/verify";

/// Facilitator path for payment settlement, relative to the base URL.
pub const SETTLE_PATH: &str = "./api/v1/settle";

/// Default payment validity window advertised in requirements.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Default MIME type of the protected resource.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Default budget for a single facilitator call.
pub const DEFAULT_FACILITATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Default signing-domain name placed in `extra`.
pub const DEFAULT_TOKEN_NAME: &str = "USD for Filecoin Community";

/// Default signing-domain version placed in `extra`.
pub const DEFAULT_TOKEN_VERSION: &str = "1";

/// Default upper bound on a downstream response body held for inspection (10 MiB).
pub const DEFAULT_MAX_CAPTURED_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Number of body characters included in response logs.
pub const LOGGED_BODY_PREVIEW_CHARS: usize = 1000;

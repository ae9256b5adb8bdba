//! Integration tests for cloudfm-gdrive
//!
//! Uses wiremock to stand in for Google's discovery document, token endpoint
//! and the Drive v3 API, and drives the provider through its
//! `ICloudProvider` surface.

mod common;

mod test_authorization;
mod test_file_operations;

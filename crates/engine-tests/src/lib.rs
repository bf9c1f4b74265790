#![allow(dead_code)]

pub mod integration;
pub mod utils;

/// Job id shared by the scenarios; also the default blob prefix.
pub const JOB_ID: &str = "ads";
pub const BASE_URL: &str = "https://graph.example.com/v19.0/act_1/ads";
pub const ACCESS_TOKEN: &str = "EAAB-test-secret-token";

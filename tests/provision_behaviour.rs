//! Behavioural scenarios for provisioning and querying over scripted sessions.

mod provision;

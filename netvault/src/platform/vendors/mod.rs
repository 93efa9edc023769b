//! Built-in model profiles.

pub mod arista_eos;
pub mod cisco_ios;
pub mod cisco_iosxr;
pub mod fortios;
pub mod juniper;
pub mod linux;
pub mod mikrotik;
pub mod nokia_sros;
pub mod run;

use super::Model;

/// All built-in models, in registration order.
pub fn builtin() -> Vec<Model> {
    vec![
        cisco_ios::model(),
        cisco_iosxr::model(),
        arista_eos::model(),
        juniper::model(),
        nokia_sros::model(),
        linux::model(),
        mikrotik::model(),
        fortios::model(),
        run::model(),
    ]
}

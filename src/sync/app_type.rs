//! Client application categories and the entity types each is allowed to sync

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Declared app category of a syncing client
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    SalesApp,
    DeliveryApp,
    WarehouseApp,
    ManagerApp,
    MobileApp,
}

impl AppType {
    /// Entity types this app category is permitted to pull.
    ///
    /// A pull never returns events outside this set, whatever extra filter
    /// the caller supplies.
    pub fn allowed_models(&self) -> &'static [&'static str] {
        match self {
            AppType::SalesApp => &[
                "sale.order",
                "res.partner",
                "product.template",
                "product.category",
            ],
            AppType::DeliveryApp => &["stock.picking", "res.partner"],
            AppType::WarehouseApp => &["stock.picking", "stock.move", "product.product"],
            AppType::ManagerApp => &[
                "sale.order",
                "res.partner",
                "account.move",
                "purchase.order",
                "hr.expense",
            ],
            AppType::MobileApp => &["sale.order", "res.partner", "product.template"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wire_strings_round_trip() {
        assert_eq!(AppType::DeliveryApp.to_string(), "delivery_app");
        assert_eq!(AppType::from_str("warehouse_app").unwrap(), AppType::WarehouseApp);
        assert!(AppType::from_str("desktop_app").is_err());
    }

    #[test]
    fn delivery_app_is_limited_to_picking_and_partner() {
        assert_eq!(
            AppType::DeliveryApp.allowed_models(),
            &["stock.picking", "res.partner"]
        );
    }
}

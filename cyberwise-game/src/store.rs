//! Shop stock and purchases: tool upgrades, hub themes and the premium pass.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::constants::PREMIUM_PASS_COST;
use crate::state::{PlayerState, ThemeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseError {
    #[error("insufficient funds: need {cost}, have {salary}")]
    InsufficientFunds { cost: u64, salary: u64 },
    #[error("{tool} is already at max level")]
    MaxLevel { tool: String },
    #[error("unknown tool {0}")]
    UnknownTool(String),
    #[error("tool {0} is not owned")]
    NotOwned(String),
    #[error("unknown shop item {0}")]
    UnknownItem(String),
    #[error("premium pass already active")]
    AlreadyPremium,
}

/// A single item available in the shop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub cost: u64,
    pub theme: ThemeId,
}

/// Complete shop stock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct ShopCatalog {
    pub items: Vec<ShopItem>,
}

impl ShopCatalog {
    #[must_use]
    pub fn find_item(&self, item_id: &str) -> Option<&ShopItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    #[must_use]
    pub fn item_for_theme(&self, theme: ThemeId) -> Option<&ShopItem> {
        self.items.iter().find(|item| item.theme == theme)
    }
}

/// Result of buying or equipping a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemePurchase {
    pub theme: ThemeId,
    /// Zero when the theme was already owned.
    pub charged: u64,
}

fn ensure_funds(state: &PlayerState, cost: u64) -> Result<(), PurchaseError> {
    if state.salary < cost {
        return Err(PurchaseError::InsufficientFunds {
            cost,
            salary: state.salary,
        });
    }
    Ok(())
}

/// Buy the next upgrade of an owned tool.
///
/// # Errors
///
/// Fails without touching `state` if the tool is unknown or not owned, is
/// already at its last upgrade, or the player cannot afford the next one.
pub fn purchase_tool_upgrade(
    state: &mut PlayerState,
    tool_id: &str,
    catalog: &Catalog,
) -> Result<u32, PurchaseError> {
    let def = catalog
        .tool(tool_id)
        .ok_or_else(|| PurchaseError::UnknownTool(tool_id.to_string()))?;
    let current = state
        .inventory
        .tool_level(tool_id)
        .ok_or_else(|| PurchaseError::NotOwned(tool_id.to_string()))?;
    let next = def
        .upgrade_to(current + 1)
        .ok_or_else(|| PurchaseError::MaxLevel {
            tool: tool_id.to_string(),
        })?;
    ensure_funds(state, next.cost)?;

    state.salary -= next.cost;
    if let Some(owned) = state.inventory.tool_mut(tool_id) {
        owned.level = next.level;
    }
    log::debug!("{tool_id} upgraded to level {} for {}", next.level, next.cost);
    Ok(next.level)
}

/// Buy (or re-equip) a theme from the shop.
///
/// Owned themes are equipped for free; anything else is charged once and
/// remembered in `owned_themes`.
///
/// # Errors
///
/// Returns `UnknownItem` for items not in stock and `InsufficientFunds`
/// when an unowned theme costs more than the current salary.
pub fn purchase_theme(
    state: &mut PlayerState,
    item_id: &str,
    shop: &ShopCatalog,
) -> Result<ThemePurchase, PurchaseError> {
    let item = shop
        .find_item(item_id)
        .ok_or_else(|| PurchaseError::UnknownItem(item_id.to_string()))?;
    let charged = if state.owns_theme(item.theme) {
        0
    } else {
        ensure_funds(state, item.cost)?;
        item.cost
    };

    state.salary -= charged;
    state.owned_themes.insert(item.theme);
    state.settings.theme = item.theme;
    Ok(ThemePurchase {
        theme: item.theme,
        charged,
    })
}

/// Unlock the premium data pass track.
///
/// # Errors
///
/// Returns `AlreadyPremium` if the pass is already active, otherwise
/// `InsufficientFunds` when the salary is below the pass cost.
pub fn buy_premium_pass(state: &mut PlayerState) -> Result<(), PurchaseError> {
    if state.data_pass.is_premium {
        return Err(PurchaseError::AlreadyPremium);
    }
    ensure_funds(state, PREMIUM_PASS_COST)?;
    state.salary -= PREMIUM_PASS_COST;
    state.data_pass.is_premium = true;
    log::info!("{} bought the premium data pass", state.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::load_default().unwrap()
    }

    #[test]
    fn upgrade_rejected_when_broke() {
        let catalog = catalog();
        let mut state = PlayerState::new("Broke");
        let err = purchase_tool_upgrade(&mut state, "phishsniffer", &catalog).unwrap_err();
        assert_eq!(
            err,
            PurchaseError::InsufficientFunds {
                cost: 150,
                salary: 100
            }
        );
        assert_eq!(state.salary, 100);
        assert_eq!(state.inventory.tool_level("phishsniffer"), Some(1));
    }

    #[test]
    fn upgrade_deducts_and_levels_until_max() {
        let catalog = catalog();
        let mut state = PlayerState::new("Rich");
        state.salary = 1_000;
        assert_eq!(purchase_tool_upgrade(&mut state, "phishsniffer", &catalog), Ok(2));
        assert_eq!(purchase_tool_upgrade(&mut state, "phishsniffer", &catalog), Ok(3));
        assert_eq!(state.salary, 1_000 - 150 - 400);
        assert_eq!(
            purchase_tool_upgrade(&mut state, "phishsniffer", &catalog),
            Err(PurchaseError::MaxLevel {
                tool: "phishsniffer".to_string()
            })
        );
        assert_eq!(state.salary, 450);
    }

    #[test]
    fn upgrade_requires_known_owned_tool() {
        let catalog = catalog();
        let mut state = PlayerState::new("Rich");
        state.salary = 1_000;
        assert_eq!(
            purchase_tool_upgrade(&mut state, "laser", &catalog),
            Err(PurchaseError::UnknownTool("laser".to_string()))
        );
        assert_eq!(
            purchase_tool_upgrade(&mut state, "leaktracker", &catalog),
            Err(PurchaseError::NotOwned("leaktracker".to_string()))
        );
        assert_eq!(state.salary, 1_000);
    }

    #[test]
    fn themes_charge_once_and_reequip_free() {
        let catalog = catalog();
        let mut state = PlayerState::new("Stylish");
        state.salary = 400;
        let bought = purchase_theme(&mut state, "theme_matrix", &catalog.shop).unwrap();
        assert_eq!(bought.charged, 300);
        assert_eq!(state.salary, 100);

        purchase_theme(&mut state, "theme_default", &catalog.shop).unwrap();
        assert_eq!(state.settings.theme, ThemeId::Default);

        let again = purchase_theme(&mut state, "theme_matrix", &catalog.shop).unwrap();
        assert_eq!(again.charged, 0);
        assert_eq!(state.salary, 100);
        assert_eq!(state.settings.theme, ThemeId::Matrix);

        assert!(matches!(
            purchase_theme(&mut state, "theme_gold", &catalog.shop),
            Err(PurchaseError::InsufficientFunds { cost: 750, .. })
        ));
        assert_eq!(state.settings.theme, ThemeId::Matrix);
        assert!(matches!(
            purchase_theme(&mut state, "theme_neon", &catalog.shop),
            Err(PurchaseError::UnknownItem(_))
        ));
    }

    #[test]
    fn premium_pass_is_charged_once() {
        let mut state = PlayerState::new("Vip");
        assert!(matches!(
            buy_premium_pass(&mut state),
            Err(PurchaseError::InsufficientFunds { cost: 500, .. })
        ));
        state.salary = 600;
        buy_premium_pass(&mut state).unwrap();
        assert!(state.data_pass.is_premium);
        assert_eq!(state.salary, 100);
        assert_eq!(buy_premium_pass(&mut state), Err(PurchaseError::AlreadyPremium));
        assert_eq!(state.salary, 100);
    }

    #[test]
    fn shop_lookup_by_theme() {
        let catalog = catalog();
        let item = catalog.shop.item_for_theme(ThemeId::Gold).unwrap();
        assert_eq!(item.id, "theme_gold");
        assert_eq!(item.cost, 750);
    }
}

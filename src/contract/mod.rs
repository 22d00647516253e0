//! UI reachability contract.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`model`] | Contract document, required entries and named action rules |
//! | [`validator`] | Advisory cross-check against a merged manifest |

pub mod model;
pub mod validator;

pub use model::{ActionRule, ContractAction, ContractScreen, UiContract, ACTION_RULES, REQUIRED_ACTIONS, REQUIRED_SCREENS};
pub use validator::{collect_action_references, validate_ui_contract_against_manifest};

pub mod domain;
pub mod infrastructure;
pub mod provision_models_use_case;

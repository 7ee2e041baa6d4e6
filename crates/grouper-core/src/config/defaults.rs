//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Grouper".to_string()
}

pub fn default_handle() -> String {
    "grouper".to_string()
}

pub fn default_data_dir() -> String {
    "~/.grouper".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_platform_base_url() -> String {
    "http://127.0.0.1:5555".to_string()
}

pub fn default_poll_timeout() -> u64 {
    30
}

pub fn default_provider() -> String {
    "openai".to_string()
}

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_db_path() -> String {
    "~/.grouper/data/grouper.db".to_string()
}

pub fn default_idle_timeout() -> u64 {
    3600
}

pub fn default_sweep_interval() -> u64 {
    300
}

pub fn default_history_len() -> usize {
    3
}

pub fn default_invitation_ttl() -> u64 {
    86_400
}

pub fn default_call_timeout() -> u64 {
    30
}

pub fn default_handle_suffixes() -> Vec<String> {
    vec![".eth".to_string(), ".base.eth".to_string()]
}

pub fn default_address_field() -> String {
    "address".to_string()
}

pub fn default_name_services() -> Vec<super::NameServiceConfig> {
    vec![
        super::NameServiceConfig {
            name: "ensdata".to_string(),
            url_template: "https://api.ensdata.net/{name}".to_string(),
            address_field: default_address_field(),
        },
        super::NameServiceConfig {
            name: "web3bio".to_string(),
            url_template: "https://api.web3.bio/ns/{name}".to_string(),
            address_field: default_address_field(),
        },
    ]
}

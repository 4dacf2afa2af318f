//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use ethers::types::U256;
    use std::io::Write;

    #[test]
    fn test_strategy_config_default() {
        let config = StrategyConfig::default();
        assert_eq!(config.scan_interval_ms, 500);
        assert_eq!(config.min_profit_usd, 5.0);
        assert_eq!(config.slippage_bps, 50);
        assert_eq!(config.trade_sizes_native, vec![0.005, 0.01, 0.05]);
        assert_eq!(config.fee_tiers, vec![500, 3000]);
        assert_eq!(config.gas_units_per_round_trip, 350_000);
        assert_eq!(config.balance_refresh_scans, 30);
        assert_eq!(config.max_opportunities, 30);
        assert_eq!(config.max_trade_log, 50);
    }

    #[test]
    fn test_strategy_config_empty_toml_uses_defaults() {
        let config: StrategyConfig = toml::from_str("").unwrap();
        assert_eq!(config.scan_interval_ms, 500);
        assert_eq!(config.fee_tiers, vec![500, 3000]);
    }

    #[test]
    fn test_strategy_config_deserialize() {
        let toml_str = r#"
scan_interval_ms = 1000
min_profit_usd = 2.5
slippage_bps = 30
trade_sizes_native = [0.1, 0.5]
fee_tiers = [100, 500, 3000]
"#;
        let config: StrategyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scan_interval_ms, 1000);
        assert_eq!(config.min_profit_usd, 2.5);
        assert_eq!(config.slippage_bps, 30);
        assert_eq!(config.trade_sizes_native.len(), 2);
        assert_eq!(config.fee_tiers.len(), 3);
        // Unspecified fields keep their defaults
        assert_eq!(config.max_trade_log, 50);
    }

    #[test]
    fn test_server_config_default_port() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8787);
        let config: ServerConfig = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_chain_config_deserialize() {
        let toml_str = r#"
chain_id = 137
name = "Polygon"
rpc_urls = ["https://polygon-rpc.com"]
explorer_url = "https://polygonscan.com"
native_symbol = "POL"
wrapped_native = "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"
stable_token = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"
stable_decimals = 6
quoter = "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6"
router = "0xE592427A0AEce92De3Edee1F18E0157C05861564"
"#;
        let config: ChainConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.chain_id, 137);
        assert_eq!(config.name, "Polygon");
        assert_eq!(config.stable_decimals, 6);
        assert_eq!(config.rpc_urls.len(), 1);
    }

    #[test]
    fn test_trade_sizes_wei_conversion() {
        let config = StrategyConfig {
            trade_sizes_native: vec![0.005, 1.0],
            ..Default::default()
        };
        let sizes = config.trade_sizes_wei();
        assert_eq!(sizes[0], U256::from(5_000_000_000_000_000u64));
        assert_eq!(sizes[1], U256::exp10(18));
    }

    #[test]
    fn test_native_to_wei() {
        assert_eq!(native_to_wei(0.0), U256::zero());
        assert_eq!(native_to_wei(0.01), U256::exp10(16));
        assert_eq!(native_to_wei(2.0), U256::exp10(18) * U256::from(2));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = Config::load("/nonexistent/config.toml").unwrap();
        assert_eq!(config.server.port, 8787);
        assert!(config.chains.is_none());
        // Registry kicks in when no chain override is configured
        assert!(!config.chain_table().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9999

[strategy]
min_profit_usd = 1.5
"#
        )
        .unwrap();
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.strategy.min_profit_usd, 1.5);
        assert_eq!(config.strategy.scan_interval_ms, 500);
    }

    #[test]
    fn test_load_rejects_single_fee_tier() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[strategy]
fee_tiers = [500]
"#
        )
        .unwrap();
        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("fee_tiers"));
    }

    #[test]
    fn test_load_rejects_zero_scan_interval() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[strategy]
scan_interval_ms = 0
"#
        )
        .unwrap();
        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("scan_interval_ms"));
    }

    #[test]
    fn test_load_rejects_zero_balance_refresh_scans() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[strategy]
balance_refresh_scans = 0
"#
        )
        .unwrap();
        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("balance_refresh_scans"));
    }

    #[test]
    fn test_load_rejects_empty_trade_sizes() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[strategy]
trade_sizes_native = []
"#
        )
        .unwrap();
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_chain_table_prefers_override() {
        let toml_str = r#"
[[chains]]
chain_id = 1
name = "Mainnet"
rpc_urls = ["https://eth.llamarpc.com"]
explorer_url = "https://etherscan.io"
native_symbol = "ETH"
wrapped_native = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
stable_token = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
stable_decimals = 6
quoter = "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6"
router = "0xE592427A0AEce92De3Edee1F18E0157C05861564"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let table = config.chain_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].chain_id, 1);
    }
}

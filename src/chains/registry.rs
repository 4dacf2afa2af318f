//! Built-in chain table
//!
//! Uniswap V3 deployments with a wrapped-native/USDC pair per chain. The
//! table can be replaced wholesale from the config file.

use ethers::types::Address;

use crate::config::ChainConfig;

fn addr(s: &str) -> Address {
    s.parse().expect("static chain registry address")
}

pub fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig {
            chain_id: 137,
            name: "Polygon".into(),
            rpc_urls: vec![
                "https://polygon-rpc.com".into(),
                "https://rpc.ankr.com/polygon".into(),
                "https://polygon.llamarpc.com".into(),
            ],
            explorer_url: "https://polygonscan.com".into(),
            native_symbol: "MATIC".into(),
            wrapped_native: addr("0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
            stable_token: addr("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
            stable_decimals: 6,
            quoter: addr("0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6"),
            router: addr("0xE592427A0AEce92De3Edee1F18E0157C05861564"),
        },
        ChainConfig {
            chain_id: 42161,
            name: "Arbitrum".into(),
            rpc_urls: vec![
                "https://arb1.arbitrum.io/rpc".into(),
                "https://rpc.ankr.com/arbitrum".into(),
            ],
            explorer_url: "https://arbiscan.io".into(),
            native_symbol: "ETH".into(),
            wrapped_native: addr("0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
            stable_token: addr("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
            stable_decimals: 6,
            quoter: addr("0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6"),
            router: addr("0xE592427A0AEce92De3Edee1F18E0157C05861564"),
        },
        ChainConfig {
            chain_id: 10,
            name: "Optimism".into(),
            rpc_urls: vec![
                "https://mainnet.optimism.io".into(),
                "https://rpc.ankr.com/optimism".into(),
            ],
            explorer_url: "https://optimistic.etherscan.io".into(),
            native_symbol: "ETH".into(),
            wrapped_native: addr("0x4200000000000000000000000000000000000006"),
            stable_token: addr("0x7F5c764cBc14f9669B88837ca1490cCa17c31607"),
            stable_decimals: 6,
            quoter: addr("0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6"),
            router: addr("0xE592427A0AEce92De3Edee1F18E0157C05861564"),
        },
        ChainConfig {
            chain_id: 8453,
            name: "Base".into(),
            rpc_urls: vec![
                "https://mainnet.base.org".into(),
                "https://base.llamarpc.com".into(),
            ],
            explorer_url: "https://basescan.org".into(),
            native_symbol: "ETH".into(),
            wrapped_native: addr("0x4200000000000000000000000000000000000006"),
            stable_token: addr("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            stable_decimals: 6,
            quoter: addr("0x3d4e44Eb1374240CE5F1B871ab261CD16335B76a"),
            router: addr("0x2626664c2603336E57B271c5C0b26F421741e481"),
        },
    ]
}

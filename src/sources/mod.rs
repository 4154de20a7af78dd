//! External signal sources consumed by the fair-value models

pub mod binance;
pub mod coingecko;
pub mod nws;

pub use binance::{parse_klines, realized_vol_from_closes, BinanceClient, Candle};
pub use coingecko::CoinGeckoClient;
pub use nws::{parse_weather_question, LocationResolver, NwsClient, NwsPoint, PopSignal};

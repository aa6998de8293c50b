use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    StrongBuy,
    StrongSell,
    BuyLean,
    SellLean,
    Neutral,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrongBuy => "STRONG BUY",
            Self::StrongSell => "STRONG SELL",
            Self::BuyLean => "BUY LEAN",
            Self::SellLean => "SELL LEAN",
            Self::Neutral => "NEUTRAL",
        }
    }

    pub fn is_strong(self) -> bool {
        matches!(self, Self::StrongBuy | Self::StrongSell)
    }

    pub fn is_buy(self) -> bool {
        matches!(self, Self::StrongBuy | Self::BuyLean)
    }

    pub fn is_sell(self) -> bool {
        matches!(self, Self::StrongSell | Self::SellLean)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative market condition attached to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    AbsorptionOfSelling,
    BuyingExhaustion,
    AggressiveBuyingAboveVwap,
    LargeLotAccumulation,
    SellingBelowVwap,
    LargeLotDistribution,
    SmallLotLedBuying,
    SmallLotLedSelling,
    WaitAndSee,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AbsorptionOfSelling => "absorption of selling",
            Self::BuyingExhaustion => "buying exhaustion",
            Self::AggressiveBuyingAboveVwap => "aggressive buying above VWAP",
            Self::LargeLotAccumulation => "large-lot accumulation",
            Self::SellingBelowVwap => "selling below VWAP",
            Self::LargeLotDistribution => "large-lot distribution",
            Self::SmallLotLedBuying => "small-lot-led buying",
            Self::SmallLotLedSelling => "small-lot-led selling",
            Self::WaitAndSee => "wait-and-see",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Fee buffering and sanity checks for the activation transaction

use crate::chain::{ChainState, FeeLevels};
use crate::error::{ActivatorError, ActivatorResult};

use ethers::types::U256;
use tracing::{debug, warn};

/// Gas estimator for the activation transaction
pub struct GasEstimator {
    /// Buffer percentage for fees (e.g., 10 = 10% buffer)
    fee_buffer_percent: u64,
    /// Upper bound on max fee per gas after buffering
    max_fee_cap: Option<U256>,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new(fee_buffer_percent: u64, max_fee_cap: Option<U256>) -> Self {
        Self {
            fee_buffer_percent,
            max_fee_cap,
        }
    }

    /// Fetch fee levels for this attempt and apply buffer and cap
    pub async fn get_fee_levels(&self, chain: &dyn ChainState) -> ActivatorResult<FeeLevels> {
        let fees = chain.fee_levels().await?;
        let adjusted = self.adjust(fees)?;
        debug!("Fee levels: {:?} -> {:?}", fees, adjusted);
        Ok(adjusted)
    }

    /// Apply the buffer, then the cap. A tip above the max fee is rejected.
    pub fn adjust(&self, fees: FeeLevels) -> ActivatorResult<FeeLevels> {
        let mut max_fee = self.buffered(fees.max_fee_per_gas)?;
        let priority_fee = self.buffered(fees.max_priority_fee_per_gas)?;

        if let Some(cap) = self.max_fee_cap {
            if max_fee > cap {
                warn!("Max fee {} above configured cap, using {}", max_fee, cap);
                max_fee = cap;
            }
        }

        if priority_fee > max_fee {
            return Err(ActivatorError::Range(format!(
                "priority fee {} exceeds max fee {}",
                priority_fee, max_fee
            )));
        }

        Ok(FeeLevels {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        })
    }

    fn buffered(&self, value: U256) -> ActivatorResult<U256> {
        let buffer = value
            .checked_mul(U256::from(self.fee_buffer_percent))
            .map(|v| v / 100)
            .ok_or_else(|| ActivatorError::Range(format!("fee {} overflows with buffer", value)))?;
        value
            .checked_add(buffer)
            .ok_or_else(|| ActivatorError::Range(format!("fee {} overflows with buffer", value)))
    }

    /// Calculate the worst-case cost in wei
    pub fn calculate_cost(gas_limit: U256, fees: &FeeLevels) -> U256 {
        gas_limit.saturating_mul(fees.max_fee_per_gas)
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new(0, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainState;

    fn fees(max: u64, tip: u64) -> FeeLevels {
        FeeLevels {
            max_fee_per_gas: U256::from(max),
            max_priority_fee_per_gas: U256::from(tip),
        }
    }

    #[test]
    fn test_no_buffer_is_identity() {
        let estimator = GasEstimator::default();
        assert_eq!(estimator.adjust(fees(100, 10)).unwrap(), fees(100, 10));
    }

    #[test]
    fn test_buffer_applied() {
        let estimator = GasEstimator::new(20, None);
        assert_eq!(estimator.adjust(fees(100, 10)).unwrap(), fees(120, 12));
    }

    #[test]
    fn test_cap_clamps_max_fee() {
        let estimator = GasEstimator::new(0, Some(U256::from(50u64)));
        assert_eq!(estimator.adjust(fees(100, 10)).unwrap(), fees(50, 10));
        assert_eq!(estimator.adjust(fees(40, 10)).unwrap(), fees(40, 10));
    }

    #[test]
    fn test_tip_above_max_fee_rejected() {
        let estimator = GasEstimator::default();
        assert!(matches!(
            estimator.adjust(fees(10, 11)),
            Err(ActivatorError::Range(_))
        ));

        let capped = GasEstimator::new(0, Some(U256::from(50u64)));
        assert!(matches!(
            capped.adjust(fees(100, 80)),
            Err(ActivatorError::Range(_))
        ));
    }

    #[test]
    fn test_overflow_is_range_error() {
        let estimator = GasEstimator::new(10, None);
        let huge = FeeLevels {
            max_fee_per_gas: U256::MAX,
            max_priority_fee_per_gas: U256::one(),
        };
        assert!(matches!(estimator.adjust(huge), Err(ActivatorError::Range(_))));
    }

    #[test]
    fn test_calculate_cost() {
        let cost = GasEstimator::calculate_cost(U256::from(1_000_000u64), &fees(2_000_000_000, 1));
        assert_eq!(cost, U256::from(2_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_get_fee_levels_uses_chain() {
        let mut chain = MockChainState::new();
        chain
            .expect_fee_levels()
            .times(1)
            .returning(|| Ok(fees(200, 20)));

        let estimator = GasEstimator::new(10, None);
        let levels = estimator.get_fee_levels(&chain).await.unwrap();
        assert_eq!(levels, fees(220, 22));
    }
}

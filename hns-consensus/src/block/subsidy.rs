//! Block subsidies and halvings.

use std::convert::TryFrom;

use hns_chain::{
    amount::{Amount, Error},
    block::Height,
    parameters::Network,
};

use crate::parameters::subsidy::*;

/// The `BlockSubsidy(height)`.
///
/// The subsidy starts at 2000 coins and halves every halving interval
/// until the shift runs out of bits.
pub fn block_subsidy(height: Height, network: Network) -> Result<Amount, Error> {
    let halvings = height.0 / network.halving_interval().0;
    if halvings >= 64 {
        return Amount::try_from(0);
    }
    let subsidy = MAX_BLOCK_SUBSIDY >> (halvings as u64);
    Amount::try_from(subsidy)
}

#[cfg(test)]
mod test {
    use super::*;
    use color_eyre::Report;

    #[test]
    fn block_subsidy_test() -> Result<(), Report> {
        hns_test::init();

        block_subsidy_for_network(Network::Mainnet)?;
        block_subsidy_for_network(Network::Regtest)?;

        Ok(())
    }

    fn block_subsidy_for_network(network: Network) -> Result<(), Report> {
        let interval = network.halving_interval().0;

        // The initial block subsidy is 2000 coins
        assert_eq!(
            Amount::try_from(MAX_BLOCK_SUBSIDY),
            block_subsidy(Height(0), network)
        );
        assert_eq!(
            Amount::try_from(MAX_BLOCK_SUBSIDY),
            block_subsidy(Height(interval - 1), network)
        );

        // After the first halving, it's 1000 coins
        assert_eq!(
            Amount::try_from(MAX_BLOCK_SUBSIDY / 2),
            block_subsidy(Height(interval), network)
        );

        // After the fourth halving, 125 coins
        assert_eq!(
            Amount::try_from(MAX_BLOCK_SUBSIDY / 16),
            block_subsidy(Height(interval * 4), network)
        );

        // Far past the last meaningful halving, there is no subsidy
        assert_eq!(Amount::try_from(0), block_subsidy(Height(interval * 64), network));

        Ok(())
    }
}

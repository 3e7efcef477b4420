//! Transaction checks.
//!
//! The `is_sane` family is context-free: it looks only at the
//! transaction itself. `spends` is contextual: it accounts the actual
//! coins being consumed.

use std::convert::TryFrom;

use hns_chain::{
    amount::Amount,
    parameters::Network,
    transaction::{Transaction, LOCKTIME_THRESHOLD, MAX_TX_SIZE, SEQUENCE_FINAL},
};
use hns_state::CoinEntry;

use crate::error::TransactionError;

/// Checks that the transaction has inputs and outputs.
pub fn has_inputs_and_outputs(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() {
        Err(TransactionError::NoInputs)
    } else if tx.outputs.is_empty() {
        Err(TransactionError::NoOutputs)
    } else {
        Ok(())
    }
}

/// Checks that no non-coinbase input carries the null outpoint.
pub fn outpoints_not_null(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.is_coinbase() {
        return Ok(());
    }
    if tx.contains_coinbase_input() {
        return Err(TransactionError::CoinbaseInputFound);
    }
    Ok(())
}

/// Checks every output value individually and the total against the
/// money range. Catches both oversized single outputs and sums that
/// would wrap.
pub fn output_values_in_range(tx: &Transaction) -> Result<(), TransactionError> {
    let mut sum = Amount::ZERO;
    for output in &tx.outputs {
        let value = Amount::try_from(output.value.value()).map_err(TransactionError::Amount)?;
        sum = sum.checked_add(value).map_err(TransactionError::Amount)?;
    }
    Ok(())
}

/// Checks that every covenant has the item layout its type requires.
pub fn covenants_well_formed(tx: &Transaction) -> Result<(), TransactionError> {
    for (index, output) in tx.outputs.iter().enumerate() {
        if !output.covenant.is_well_formed() {
            return Err(TransactionError::MalformedCovenant(index));
        }
    }
    Ok(())
}

/// Checks the serialized size limit.
pub fn size_in_range(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.len() as u64 > MAX_TX_SIZE {
        return Err(TransactionError::OversizedTransaction);
    }
    Ok(())
}

/// The context-free structural check: everything knowable from the
/// transaction alone.
pub fn is_sane(tx: &Transaction) -> Result<(), TransactionError> {
    has_inputs_and_outputs(tx)?;
    outpoints_not_null(tx)?;
    output_values_in_range(tx)?;
    covenants_well_formed(tx)?;
    size_in_range(tx)?;
    Ok(())
}

/// Checks the absolute locktime at `height` with median-time `mtp`.
///
/// Inputs that are all final opt the transaction out entirely.
pub fn locktime(tx: &Transaction, height: u32, mtp: u64) -> Result<(), TransactionError> {
    if tx.locktime == 0 {
        return Ok(());
    }
    if tx.inputs.iter().all(|input| input.sequence == SEQUENCE_FINAL) {
        return Ok(());
    }
    let satisfied = if tx.locktime < LOCKTIME_THRESHOLD {
        (tx.locktime as u64) < height as u64
    } else {
        (tx.locktime as u64) < mtp
    };
    if satisfied {
        Ok(())
    } else {
        Err(TransactionError::LockTime)
    }
}

/// The contextual value accounting for one non-coinbase transaction:
/// every spent coin must be mature, the input sum must stay in the
/// money range, and outputs must not exceed inputs. Returns the fee.
pub fn spends(
    tx: &Transaction,
    spent: &[CoinEntry],
    network: Network,
    height: u32,
) -> Result<Amount, TransactionError> {
    let mut input_sum = Amount::ZERO;
    for (input, coin) in tx.inputs.iter().zip(spent.iter()) {
        if !coin.is_mature(network, height) {
            return Err(TransactionError::ImmatureCoinbaseSpend(input.prevout));
        }
        let value = Amount::try_from(coin.value.value()).map_err(TransactionError::Amount)?;
        input_sum = input_sum
            .checked_add(value)
            .map_err(TransactionError::Amount)?;
    }

    let output_sum = tx.output_value_sum().map_err(TransactionError::Amount)?;
    input_sum
        .checked_sub(output_sum)
        .map_err(|_| TransactionError::NegativeFee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hns_chain::{
        address::Address,
        amount::MAX_MONEY,
        covenant::Covenant,
        transaction::{Hash, Input, OutPoint, Output, Witness},
    };

    fn address() -> Address {
        Address::new(0, vec![0; 20]).unwrap()
    }

    fn output(value: u64) -> Output {
        Output {
            value: Amount::from_raw(value),
            address: address(),
            covenant: Covenant::none(),
        }
    }

    fn input(index: u32) -> Input {
        Input {
            prevout: OutPoint {
                hash: Hash([1; 32]),
                index,
            },
            sequence: SEQUENCE_FINAL,
            witness: Witness::empty(),
        }
    }

    fn coin(value: u64) -> CoinEntry {
        CoinEntry {
            version: 0,
            height: 1,
            value: Amount::from_raw(value),
            address: address(),
            covenant: Covenant::none(),
            coinbase: false,
        }
    }

    #[test]
    fn output_just_over_max_fails_sanity() {
        hns_test::init();

        let tx = Transaction::new(0, vec![input(0)], vec![output(MAX_MONEY + 1)], 0);
        assert!(is_sane(&tx).is_err());

        let tx = Transaction::new(0, vec![input(0)], vec![output(MAX_MONEY)], 0);
        assert!(is_sane(&tx).is_ok());
    }

    #[test]
    fn output_sum_over_max_fails_sanity() {
        hns_test::init();

        let tx = Transaction::new(
            0,
            vec![input(0)],
            vec![output(MAX_MONEY), output(1)],
            0,
        );
        assert!(is_sane(&tx).is_err());
    }

    #[test]
    fn overfunded_input_passes_sanity_but_fails_spends() {
        hns_test::init();

        // The funding coin is corrupt (over the money range); sanity
        // cannot see that, input accounting must.
        let tx = Transaction::new(0, vec![input(0)], vec![output(MAX_MONEY)], 0);
        assert!(is_sane(&tx).is_ok());
        assert!(spends(&tx, &[coin(MAX_MONEY + 1)], Network::Regtest, 10).is_err());
    }

    #[test]
    fn input_sum_must_not_wrap_u64() {
        hns_test::init();

        // Three inputs each near u64/2 would wrap a naive sum.
        let near_half = u64::max_value() / 2;
        let tx = Transaction::new(
            0,
            vec![input(0), input(1), input(2)],
            vec![output(1)],
            0,
        );
        let spent = [coin(near_half), coin(near_half), coin(near_half)];
        assert!(spends(&tx, &spent, Network::Regtest, 10).is_err());
    }

    #[test]
    fn fee_is_inputs_minus_outputs() {
        hns_test::init();

        let tx = Transaction::new(0, vec![input(0)], vec![output(70)], 0);
        assert_eq!(
            spends(&tx, &[coin(100)], Network::Regtest, 10).unwrap(),
            Amount::from_raw(30)
        );

        let tx = Transaction::new(0, vec![input(0)], vec![output(170)], 0);
        assert!(matches!(
            spends(&tx, &[coin(100)], Network::Regtest, 10),
            Err(TransactionError::NegativeFee)
        ));
    }

    #[test]
    fn immature_coinbase_rejected() {
        hns_test::init();

        let mut immature = coin(100);
        immature.coinbase = true;
        immature.height = 9;
        let tx = Transaction::new(0, vec![input(0)], vec![output(50)], 0);

        let maturity = Network::Regtest.coinbase_maturity();
        assert!(spends(&tx, &[immature.clone()], Network::Regtest, 9 + maturity - 1).is_err());
        assert!(spends(&tx, &[immature], Network::Regtest, 9 + maturity).is_ok());
    }

    #[test]
    fn locktime_rules() {
        hns_test::init();

        // Height locktime: satisfied only strictly below the height.
        let mut tx = Transaction::new(0, vec![input(0)], vec![output(1)], 100);
        tx.inputs[0].sequence = 0;
        assert!(locktime(&tx, 100, 0).is_err());
        assert!(locktime(&tx, 101, 0).is_ok());

        // Final sequences opt out.
        let tx = Transaction::new(0, vec![input(0)], vec![output(1)], 100);
        assert!(locktime(&tx, 100, 0).is_ok());

        // Time locktime compares against the median time.
        let mut tx = Transaction::new(
            0,
            vec![input(0)],
            vec![output(1)],
            LOCKTIME_THRESHOLD + 50,
        );
        tx.inputs[0].sequence = 0;
        assert!(locktime(&tx, 1000, (LOCKTIME_THRESHOLD + 50) as u64).is_err());
        assert!(locktime(&tx, 1000, (LOCKTIME_THRESHOLD + 51) as u64).is_ok());
    }
}

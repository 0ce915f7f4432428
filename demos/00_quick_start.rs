/// quick start - price a loan and print its schedule
use coop_lending_core::chrono::NaiveDate;
use coop_lending_core::{AmortizationSchedule, LoanCalculationInput, Money, Rate};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 500,000 over 12 months at 12% a year
    let input = LoanCalculationInput::new(
        Money::from_major(500_000),
        Rate::from_percentage(12),
        12,
        NaiveDate::from_ymd_opt(2024, 1, 15).ok_or("bad date")?,
        NaiveDate::from_ymd_opt(2024, 2, 15).ok_or("bad date")?,
    )?;
    let schedule = AmortizationSchedule::generate(&input)?;

    println!("EMI: {}", schedule.emi);
    for entry in &schedule.entries {
        println!(
            "{:>2} {} interest {:>10} principal {:>10} balance {:>12}",
            entry.installment_number, entry.due_date, entry.interest_due, entry.principal_due, entry.closing_balance
        );
    }
    println!("total interest: {}", schedule.total_interest);

    Ok(())
}

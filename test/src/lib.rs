pub mod cast;

#[cfg(test)]
mod promo_codes;
#[cfg(test)]
mod purchase_gate;
#[cfg(test)]
mod workflow;

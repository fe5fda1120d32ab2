//! Random display names of the form `Animal-NNN`

use rand::Rng;

pub const ANIMALS: [&str; 50] = [
    "Otter", "Fox", "Panda", "Wolf", "Hawk", "Lynx", "Bear", "Deer", "Eagle", "Shark", "Tiger",
    "Lion", "Cobra", "Raven", "Crane", "Whale", "Bison", "Moose", "Gecko", "Koala", "Sloth",
    "Viper", "Falcon", "Badger", "Heron", "Zebra", "Camel", "Lemur", "Squid", "Robin", "Finch",
    "Hippo", "Rhino", "Macaw", "Dingo", "Quail", "Coyote", "Ferret", "Marten", "Puffin",
    "Toucan", "Osprey", "Jackal", "Iguana", "Parrot", "Walrus", "Alpaca", "Condor", "Mantis",
    "Salmon",
];

pub fn animal_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
    let number: u16 = rng.gen_range(100..1000);
    format!("{}-{}", animal, number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_name_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let name = animal_name(&mut rng);
            let (animal, number) = name.rsplit_once('-').unwrap();
            assert!(ANIMALS.contains(&animal));
            let number: u16 = number.parse().unwrap();
            assert!((100..1000).contains(&number));
        }
    }
}

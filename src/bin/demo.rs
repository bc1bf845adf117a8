use ownbox::{ExclusiveBox, SharedBox};

fn main() {
    {
        let boxed = ExclusiveBox::new(42);
        println!("*boxed = {}", *boxed);
    }
    // Scope exit freed the exclusive allocation.

    {
        let first = SharedBox::new(42);
        let second = first.clone();
        println!("*first = {}, use_count = {}", *first, first.use_count());
        println!("*second = {}, use_count = {}", *second, second.use_count());
    }
    // Scope exit counted down to zero and freed the value and its counter.
}

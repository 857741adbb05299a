#![allow(dead_code)]

pub mod shapes;

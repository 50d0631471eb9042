// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod collector_test;
pub mod controller_test;
pub mod pipeline_test;
